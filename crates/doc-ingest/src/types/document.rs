//! Document, block and chunk types with page tracking

use serde::{Deserialize, Serialize};

/// Structural role of a text block
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// Section title, detected by font size
    Heading,
    /// Running body text
    Paragraph,
    /// Bulleted or numbered item
    List,
}

impl BlockType {
    /// Lowercase name as it appears in chunk metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::List => "list",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned bounding box, origin top-left, y growing downward
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest box covering both boxes
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// A classified text block on a page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub text: String,
    pub bbox: BBox,
    pub font_size: f32,
}

/// One page of a parsed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub page_num: u32,
    pub width: f32,
    pub height: f32,
    /// Blocks in reading order
    pub blocks: Vec<Block>,
}

/// Result of layout extraction and classification over a whole document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub filename: String,
    pub total_pages: u32,
    /// SHA-256 of the source bytes, hex encoded
    pub content_hash: String,
    pub pages: Vec<Page>,
}

impl ParsedDocument {
    /// Total number of blocks across all pages
    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }
}

/// A cleaned block tagged with its page, ready for chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanBlock {
    pub text: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub page: u32,
}

impl CleanBlock {
    pub fn new(text: impl Into<String>, block_type: BlockType, page: u32) -> Self {
        Self {
            text: text.into(),
            block_type,
            page,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A length-bounded unit of document text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `chunk_%04d`, unique and increasing within one document
    pub chunk_id: String,
    pub text: String,
    /// Character count of `text`
    pub tokens: usize,
    /// Sorted, de-duplicated page numbers
    pub pages: Vec<u32>,
    /// Types of the contributing blocks, in order
    pub block_types: Vec<BlockType>,
}

impl Chunk {
    /// Format the chunk id for a counter value
    pub fn format_id(index: usize) -> String {
        format!("chunk_{:04}", index)
    }

    /// Build a chunk from its parts, deriving `tokens` and normalizing `pages`
    pub fn new(index: usize, text: String, mut pages: Vec<u32>, block_types: Vec<BlockType>) -> Self {
        pages.sort_unstable();
        pages.dedup();
        Self {
            chunk_id: Self::format_id(index),
            tokens: text.chars().count(),
            text,
            pages,
            block_types,
        }
    }
}

/// A chunk with its embedding vector attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub embedding_dim: usize,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            embedding_dim: embedding.len(),
            chunk,
            embedding,
        }
    }
}
