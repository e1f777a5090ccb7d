//! Block text cleaning and header/footer detection

use regex::Regex;

use crate::config::LayoutConfig;
use crate::types::{BBox, CleanBlock, ParsedDocument};

/// Cleans block text and filters running headers and footers
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    header_footer_margin: f32,
    skip_header_footer: bool,
    page_number: Regex,
    page_label: Regex,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(&LayoutConfig::default())
    }
}

impl TextNormalizer {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            header_footer_margin: config.header_footer_margin,
            skip_header_footer: config.skip_header_footer,
            page_number: Regex::new(r"^\d+$").expect("Invalid regex"),
            page_label: Regex::new(r"^第\s*\d+\s*页").expect("Invalid regex"),
        }
    }

    /// Normalize the text of one block
    ///
    /// Whitespace runs collapse to a single space. A run containing a line
    /// break between two CJK ideographs is removed so words broken across
    /// rendered lines join back up. Bare page numbers become empty and a
    /// leading `第 N 页` label is stripped.
    pub fn clean_text(&self, text: &str) -> String {
        let collapsed = collapse_whitespace(text);
        let trimmed = collapsed.trim();

        if self.page_number.is_match(trimmed) {
            return String::new();
        }

        self.page_label.replace(trimmed, "").trim().to_string()
    }

    /// Whether a block sits in the header/footer band or is a lone number
    ///
    /// Comparisons are strict: a block exactly on the band edge is kept.
    pub fn is_header_footer(&self, text: &str, page_height: f32, bbox: &BBox) -> bool {
        if bbox.y0 < page_height * self.header_footer_margin {
            return true;
        }
        if bbox.y1 > page_height * (1.0 - self.header_footer_margin) {
            return true;
        }
        self.page_number.is_match(text.trim())
    }

    /// Clean every block of a document, dropping boilerplate and empty text
    pub fn clean_document(&self, doc: &ParsedDocument) -> Vec<CleanBlock> {
        let mut cleaned = Vec::with_capacity(doc.block_count());

        for page in &doc.pages {
            for block in &page.blocks {
                if self.skip_header_footer
                    && self.is_header_footer(&block.text, page.height, &block.bbox)
                {
                    tracing::debug!(
                        "Skipping header/footer on page {}: {:?}",
                        page.page_num,
                        block.text
                    );
                    continue;
                }

                let text = self.clean_text(&block.text);
                if text.is_empty() {
                    continue;
                }

                cleaned.push(CleanBlock::new(text, block.block_type, page.page_num));
            }
        }

        cleaned
    }
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }

        let mut has_break = c == '\n' || c == '\r';
        while let Some(&next) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            has_break |= next == '\n' || next == '\r';
            chars.next();
        }

        let joins_cjk = has_break
            && out.chars().next_back().is_some_and(is_cjk_ideograph)
            && chars.peek().copied().is_some_and(is_cjk_ideograph);

        if !joins_cjk {
            out.push(' ');
        }
    }

    out
}
