//! Document ingestion pipeline: layout, classification, cleaning and chunking

mod chunker;
mod classifier;
pub mod layout;
mod normalizer;
mod processor;

pub use chunker::BlockChunker;
pub use classifier::{BlockClassifier, DEFAULT_HEADING_FONT_THRESHOLD};
pub use layout::{
    ExtractedPage, LayoutExtractor, LopdfBackend, RawBlock, RenderBackend, RenderedBlock,
    RenderedPage, TextLine, TextSpan,
};
pub use normalizer::TextNormalizer;
pub use processor::{is_pdf, IngestPipeline};
