//! Ingestion pipeline orchestration

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::{ChunkingConfig, IngestConfig, LayoutConfig};
use crate::error::{Error, Result};
use crate::types::{Block, Chunk, CleanBlock, IngestOptions, Page, ParsedDocument};

use super::chunker::BlockChunker;
use super::classifier::BlockClassifier;
use super::layout::LayoutExtractor;
use super::normalizer::TextNormalizer;

/// Layout extraction, classification, cleaning and chunking for one document
///
/// The pipeline is synchronous; callers on an async runtime should run it
/// on a blocking thread.
#[derive(Clone)]
pub struct IngestPipeline {
    extractor: LayoutExtractor,
    layout: LayoutConfig,
    chunking: ChunkingConfig,
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(
            LayoutExtractor::default(),
            LayoutConfig::default(),
            ChunkingConfig::default(),
        )
    }
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(extractor: LayoutExtractor, layout: LayoutConfig, chunking: ChunkingConfig) -> Self {
        Self {
            extractor,
            layout,
            chunking,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            LayoutExtractor::default(),
            config.layout.clone(),
            config.chunking.clone(),
        )
    }

    /// Copy of this pipeline with per-invocation overrides applied
    pub fn with_options(&self, options: &IngestOptions) -> Self {
        Self {
            extractor: self.extractor.clone(),
            layout: options.resolve_layout(&self.layout),
            chunking: options.resolve_chunking(&self.chunking),
        }
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn chunking_config(&self) -> &ChunkingConfig {
        &self.chunking
    }

    /// Extract and classify the blocks of a document held in memory
    pub fn parse_bytes(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let extracted = self.extractor.extract(data).map_err(|e| match e {
            Error::FileParse { message, .. } => Error::file_parse(filename, message),
            other => other,
        })?;

        let classifier = BlockClassifier::new(self.layout.heading_font_threshold);
        let pages: Vec<Page> = extracted
            .into_iter()
            .map(|page| Page {
                page_num: page.page_num,
                width: page.width,
                height: page.height,
                blocks: page
                    .blocks
                    .into_iter()
                    .map(|raw| Block {
                        block_type: classifier.classify(&raw.text, raw.max_font_size),
                        text: raw.text.trim().to_string(),
                        bbox: raw.bbox,
                        font_size: raw.max_font_size,
                    })
                    .collect(),
            })
            .collect();

        let doc = ParsedDocument {
            filename: filename.to_string(),
            total_pages: pages.len() as u32,
            content_hash: hex::encode(Sha256::digest(data)),
            pages,
        };

        tracing::debug!(
            "Parsed {} with {}: {} pages, {} blocks",
            filename,
            self.extractor.backend_name(),
            doc.total_pages,
            doc.block_count()
        );

        Ok(doc)
    }

    /// Read a document from disk and parse it
    pub fn parse_path(&self, path: &Path) -> Result<ParsedDocument> {
        if !path.is_file() {
            return Err(Error::DocumentNotFound(path.display().to_string()));
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        if !is_pdf(&filename) {
            return Err(Error::UnsupportedFileType(filename));
        }

        let data = std::fs::read(path)?;
        self.parse_bytes(&filename, &data)
    }

    /// Clean a parsed document into page-tagged blocks
    pub fn clean(&self, doc: &ParsedDocument) -> Vec<CleanBlock> {
        TextNormalizer::new(&self.layout).clean_document(doc)
    }

    /// Fold cleaned blocks into chunks
    pub fn chunk(&self, blocks: &[CleanBlock]) -> Vec<Chunk> {
        BlockChunker::from_config(&self.chunking).chunk(blocks)
    }

    /// Full ingestion: parse + clean + chunk
    pub fn ingest(&self, filename: &str, data: &[u8]) -> Result<(ParsedDocument, Vec<Chunk>)> {
        let doc = self.parse_bytes(filename, data)?;
        let chunks = self.chunk(&self.clean(&doc));
        Ok((doc, chunks))
    }
}

/// Whether a filename carries the `.pdf` extension
pub fn is_pdf(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::layout::{RenderBackend, RenderedBlock, RenderedPage, TextLine, TextSpan};
    use crate::types::{BBox, BlockType};
    use std::sync::Arc;

    /// Backend returning fixed pages regardless of input
    struct FixedBackend(Vec<RenderedPage>);

    impl RenderBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn render(&self, _data: &[u8]) -> Result<Vec<RenderedPage>> {
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    impl RenderBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn render(&self, _data: &[u8]) -> Result<Vec<RenderedPage>> {
            Err(Error::file_parse("document.pdf", "broken xref table"))
        }
    }

    fn text(y0: f32, lines: &[(&str, f32)]) -> RenderedBlock {
        RenderedBlock::Text {
            bbox: BBox::new(72.0, y0, 520.0, y0 + 20.0 * lines.len() as f32),
            lines: lines
                .iter()
                .map(|(t, s)| TextLine::new(vec![TextSpan::new(*t, *s)]))
                .collect(),
        }
    }

    fn pipeline(pages: Vec<RenderedPage>) -> IngestPipeline {
        IngestPipeline::new(
            LayoutExtractor::new(Arc::new(FixedBackend(pages))),
            LayoutConfig::default(),
            ChunkingConfig::default(),
        )
    }

    fn sample_pages() -> Vec<RenderedPage> {
        vec![
            RenderedPage {
                page_num: 1,
                width: 595.0,
                height: 842.0,
                blocks: vec![
                    text(30.0, &[("校刊 第十期", 10.0)]),
                    text(120.0, &[("第一章 科学探索", 18.0)]),
                    text(200.0, &[("恐龙生活在距今两亿多年前的", 12.0), ("中生代时期。", 12.0)]),
                    text(300.0, &[("• 三叠纪出现了最早的恐龙", 12.0)]),
                    text(800.0, &[("1", 10.0)]),
                ],
            },
            RenderedPage {
                page_num: 2,
                width: 595.0,
                height: 842.0,
                blocks: vec![text(150.0, &[("科学家通过化石研究恐龙的习性。", 12.0)])],
            },
        ]
    }

    #[test]
    fn test_parse_classifies_blocks() {
        let doc = pipeline(sample_pages()).parse_bytes("dino.pdf", b"%PDF").unwrap();

        assert_eq!(doc.filename, "dino.pdf");
        assert_eq!(doc.total_pages, 2);
        assert_eq!(doc.content_hash.len(), 64);

        let types: Vec<BlockType> = doc.pages[0].blocks.iter().map(|b| b.block_type).collect();
        assert_eq!(
            types,
            vec![
                BlockType::Paragraph,
                BlockType::Heading,
                BlockType::Paragraph,
                BlockType::List,
                BlockType::Paragraph,
            ]
        );
        assert_eq!(doc.pages[0].blocks[1].font_size, 18.0);
    }

    #[test]
    fn test_ingest_cleans_and_chunks() {
        let (_, chunks) = pipeline(sample_pages()).ingest("dino.pdf", b"%PDF").unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].text,
            "第一章 科学探索\n恐龙生活在距今两亿多年前的中生代时期。\n• 三叠纪出现了最早的恐龙\n科学家通过化石研究恐龙的习性。"
        );
        assert_eq!(chunks[0].pages, vec![1, 2]);
        assert_eq!(
            chunks[0].block_types,
            vec![BlockType::Heading, BlockType::Paragraph, BlockType::List, BlockType::Paragraph]
        );
    }

    #[test]
    fn test_options_override_threshold_and_size() {
        let base = pipeline(sample_pages());
        let options = IngestOptions::default()
            .with_heading_font_threshold(20.0)
            .with_target_chunk_size(20)
            .with_chunk_overlap(0);
        let tuned = base.with_options(&options);

        let (doc, chunks) = tuned.ingest("dino.pdf", b"%PDF").unwrap();
        assert_eq!(doc.pages[0].blocks[1].block_type, BlockType::Paragraph);
        assert!(chunks.len() > 1);
        assert_eq!(base.chunking_config().target_chunk_size, 400);
    }

    #[test]
    fn test_parse_error_carries_filename() {
        let pipeline = IngestPipeline::new(
            LayoutExtractor::new(Arc::new(FailingBackend)),
            LayoutConfig::default(),
            ChunkingConfig::default(),
        );
        match pipeline.parse_bytes("report.pdf", b"") {
            Err(Error::FileParse { filename, message }) => {
                assert_eq!(filename, "report.pdf");
                assert!(message.contains("xref"));
            }
            other => panic!("unexpected result: {:?}", other.map(|d| d.filename)),
        }
    }

    #[test]
    fn test_parse_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = IngestPipeline::default();

        let missing = pipeline.parse_path(&dir.path().join("missing.pdf")).unwrap_err();
        assert!(matches!(missing, Error::DocumentNotFound(_)));

        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "plain text").unwrap();
        let unsupported = pipeline.parse_path(&notes).unwrap_err();
        assert!(matches!(unsupported, Error::UnsupportedFileType(_)));

        let garbage = dir.path().join("garbage.pdf");
        std::fs::write(&garbage, "not a pdf").unwrap();
        let parse = pipeline.parse_path(&garbage).unwrap_err();
        assert!(matches!(parse, Error::FileParse { ref filename, .. } if filename == "garbage.pdf"));
    }

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf("a.pdf"));
        assert!(is_pdf("A.PDF"));
        assert!(!is_pdf("a.pdf.txt"));
        assert!(!is_pdf("pdf"));
    }
}
