//! Page layout extraction
//!
//! A [`RenderBackend`] turns document bytes into rendered pages made of text
//! and image blocks. [`LayoutExtractor`] reduces each rendered page to raw
//! text blocks: one string per visual block plus its bounding box and the
//! largest font size seen in it.

use std::collections::BTreeMap;
use std::sync::Arc;

use lopdf::{Document as PdfDocument, Encoding, Object, ObjectId};

use crate::error::Result;
use crate::types::BBox;

/// US Letter, used when a page carries no usable MediaBox
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// TJ adjustments below this (in thousandths of an em) read as a word gap
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// A run of text in a single font size
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub font_size: f32,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
        }
    }
}

/// One rendered line of a text block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
}

impl TextLine {
    pub fn new(spans: Vec<TextSpan>) -> Self {
        Self { spans }
    }

    /// Concatenated span text
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// A visual block as reported by a render backend
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedBlock {
    Text { bbox: BBox, lines: Vec<TextLine> },
    Image { bbox: BBox },
}

/// One page as reported by a render backend
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// 1-based page number
    pub page_num: u32,
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<RenderedBlock>,
}

/// Document rendering capability
pub trait RenderBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Render every page of the document, in page order
    fn render(&self, data: &[u8]) -> Result<Vec<RenderedPage>>;
}

/// Text block extracted from a page, before classification
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    /// Non-blank lines joined with `\n`
    pub text: String,
    pub bbox: BBox,
    /// Largest span font size in the block
    pub max_font_size: f32,
}

/// Raw blocks of one page plus its geometry
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub page_num: u32,
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<RawBlock>,
}

/// Reduces rendered pages to raw text blocks
#[derive(Clone)]
pub struct LayoutExtractor {
    backend: Arc<dyn RenderBackend>,
}

impl Default for LayoutExtractor {
    fn default() -> Self {
        Self::new(Arc::new(LopdfBackend))
    }
}

impl LayoutExtractor {
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Render the document and extract raw blocks from every page
    pub fn extract(&self, data: &[u8]) -> Result<Vec<ExtractedPage>> {
        let pages = self.backend.render(data)?;

        Ok(pages
            .iter()
            .map(|page| {
                let blocks = Self::extract_page(page);
                if blocks.is_empty() {
                    tracing::debug!("Page {} has no text blocks", page.page_num);
                }
                ExtractedPage {
                    page_num: page.page_num,
                    width: page.width,
                    height: page.height,
                    blocks,
                }
            })
            .collect())
    }

    /// Extract raw text blocks from a single rendered page
    ///
    /// Image blocks are dropped, blank lines are skipped and blocks without
    /// any text line are omitted.
    pub fn extract_page(page: &RenderedPage) -> Vec<RawBlock> {
        let mut blocks = Vec::new();

        for block in &page.blocks {
            let RenderedBlock::Text { bbox, lines } = block else {
                continue;
            };

            let mut text_lines = Vec::new();
            let mut max_font_size = 0.0f32;

            for line in lines {
                for span in &line.spans {
                    max_font_size = max_font_size.max(span.font_size);
                }
                let line_text = line.text();
                let trimmed = line_text.trim();
                if !trimmed.is_empty() {
                    text_lines.push(trimmed.to_string());
                }
            }

            if text_lines.is_empty() {
                continue;
            }

            blocks.push(RawBlock {
                text: text_lines.join("\n"),
                bbox: *bbox,
                max_font_size,
            });
        }

        blocks
    }
}

/// Render backend interpreting PDF content streams with lopdf
///
/// Text objects (`BT`..`ET`) become text blocks. Strings are decoded through
/// the encoding of the font selected by `Tf` when the font declares one.
/// Glyph widths are estimated from the font size since font metrics are not
/// consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl RenderBackend for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn render(&self, data: &[u8]) -> Result<Vec<RenderedPage>> {
        let doc = PdfDocument::load_mem(data)?;

        let mut pages = Vec::new();
        for (page_num, page_id) in doc.get_pages() {
            let (width, height) = page_size(&doc, page_id);

            let blocks = match doc.get_and_decode_page_content(page_id) {
                Ok(content) => {
                    let fonts = FontDecoders::for_page(&doc, page_id);
                    let mut interpreter = TextInterpreter::new(height, fonts);
                    for op in &content.operations {
                        interpreter.apply(&op.operator, &op.operands);
                    }
                    interpreter.finish()
                }
                Err(e) => {
                    tracing::warn!("Could not decode content of page {}: {}", page_num, e);
                    Vec::new()
                }
            };

            pages.push(RenderedPage {
                page_num,
                width,
                height,
                blocks,
            });
        }

        Ok(pages)
    }
}

/// Page width and height from the (possibly inherited) MediaBox
fn page_size(doc: &PdfDocument, page_id: ObjectId) -> (f32, f32) {
    let mut current = Some(page_id);
    // Page trees are shallow; the bound stops reference cycles
    for _ in 0..32 {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_dictionary(id) else { break };

        if let Ok(obj) = dict.get(b"MediaBox") {
            let resolved = match obj {
                Object::Reference(r) => doc.get_object(*r).ok(),
                other => Some(other),
            };
            if let Some(Object::Array(values)) = resolved {
                let nums: Vec<f32> = values.iter().filter_map(number).collect();
                if nums.len() == 4 {
                    let width = (nums[2] - nums[0]).abs();
                    let height = (nums[3] - nums[1]).abs();
                    if width > 0.0 && height > 0.0 {
                        return (width, height);
                    }
                }
            }
        }

        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    DEFAULT_PAGE_SIZE
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Text decoders for the fonts of one page, keyed by resource name
struct FontDecoders<'a> {
    encodings: BTreeMap<Vec<u8>, Encoding<'a>>,
}

impl<'a> FontDecoders<'a> {
    fn for_page(doc: &'a PdfDocument, page_id: ObjectId) -> Self {
        let mut encodings = BTreeMap::new();

        let fonts = match doc.get_page_fonts(page_id) {
            Ok(fonts) => fonts,
            Err(e) => {
                tracing::debug!("Could not resolve fonts of page {:?}: {}", page_id, e);
                return Self { encodings };
            }
        };

        for (name, font) in fonts {
            // lopdf assumes StandardEncoding for fonts that declare nothing
            if !font.type_is(b"Font") || !(font.has(b"Encoding") || font.has(b"ToUnicode")) {
                continue;
            }
            match font.get_font_encoding(doc) {
                Ok(encoding) => {
                    encodings.insert(name, encoding);
                }
                Err(e) => tracing::debug!(
                    "Font {} has no usable encoding: {}",
                    String::from_utf8_lossy(&name),
                    e
                ),
            }
        }

        Self { encodings }
    }

    fn decode(&self, font: Option<&[u8]>, bytes: &[u8]) -> String {
        if !has_utf16_bom(bytes) {
            if let Some(encoding) = font.and_then(|name| self.encodings.get(name)) {
                if let Ok(text) = PdfDocument::decode_text(encoding, bytes) {
                    return text;
                }
            }
        }
        decode_pdf_string(bytes)
    }
}

fn has_utf16_bom(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xFE, 0xFF])
}

/// Decode a PDF string: UTF-16BE with BOM, UTF-8 when valid, Latin-1 otherwise
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if has_utf16_bom(bytes) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Full-width characters take one em, everything else half
fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x2E80..=0x9FFF | 0xAC00..=0xD7AF | 0xF900..=0xFAFF | 0xFF00..=0xFF60)
}

fn estimate_width_em(text: &str) -> f32 {
    text.chars().map(|c| if is_wide(c) { 1.0 } else { 0.5 }).sum()
}

/// Affine matrix `[a b c d e f]` in PDF row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        let v: Vec<f32> = operands.iter().filter_map(number).collect();
        (v.len() == 6).then(|| Matrix {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    fn translation(tx: f32, ty: f32) -> Matrix {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Line under construction inside a text object
struct LineBuilder {
    baseline: f32,
    spans: Vec<TextSpan>,
}

/// Text object under construction
#[derive(Default)]
struct BlockBuilder {
    bbox: Option<BBox>,
    lines: Vec<TextLine>,
    current: Option<LineBuilder>,
}

impl BlockBuilder {
    fn push_span(&mut self, span: TextSpan, baseline: f32, bbox: BBox) {
        let tolerance = (span.font_size * 0.5).max(1.0);
        let same_line = self
            .current
            .as_ref()
            .is_some_and(|line| (line.baseline - baseline).abs() <= tolerance);

        if !same_line {
            self.close_line();
            self.current = Some(LineBuilder {
                baseline,
                spans: Vec::new(),
            });
        }
        if let Some(line) = self.current.as_mut() {
            line.spans.push(span);
        }
        self.bbox = Some(match self.bbox {
            Some(existing) => existing.union(&bbox),
            None => bbox,
        });
    }

    fn close_line(&mut self) {
        if let Some(line) = self.current.take() {
            if !line.spans.is_empty() {
                self.lines.push(TextLine::new(line.spans));
            }
        }
    }

    fn finish(mut self) -> Option<RenderedBlock> {
        self.close_line();
        match (self.bbox, self.lines.is_empty()) {
            (Some(bbox), false) => Some(RenderedBlock::Text {
                bbox,
                lines: self.lines,
            }),
            _ => None,
        }
    }
}

/// Minimal text-state machine over content stream operators
struct TextInterpreter<'a> {
    page_height: f32,
    fonts: FontDecoders<'a>,
    font: Option<Vec<u8>>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font_size: f32,
    leading: f32,
    block: Option<BlockBuilder>,
    blocks: Vec<RenderedBlock>,
}

impl<'a> TextInterpreter<'a> {
    fn new(page_height: f32, fonts: FontDecoders<'a>) -> Self {
        Self {
            page_height,
            fonts,
            font: None,
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font_size: 0.0,
            leading: 0.0,
            block: None,
            blocks: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.ctm = m.then(&self.ctm);
                }
            }
            "BT" => {
                self.end_block();
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
                self.block = Some(BlockBuilder::default());
            }
            "ET" => self.end_block(),
            "Tf" => {
                self.font = operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .map(<[u8]>::to_vec);
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = self.pair(operands) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = self.pair(operands) {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&self.decode(bytes));
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&self.decode(bytes));
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(&self.decode(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items);
                }
            }
            _ => {}
        }
    }

    fn pair(&self, operands: &[Object]) -> (Option<f32>, Option<f32>) {
        (
            operands.first().and_then(number),
            operands.get(1).and_then(number),
        )
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translation(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn decode(&self, bytes: &[u8]) -> String {
        self.fonts.decode(self.font.as_deref(), bytes)
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut pending = String::new();
        for item in items {
            match item {
                Object::String(bytes, _) => pending.push_str(&self.decode(bytes)),
                other => {
                    if let Some(adjust) = number(other) {
                        if adjust < TJ_SPACE_THRESHOLD && !pending.ends_with(' ') {
                            pending.push(' ');
                        }
                    }
                }
            }
        }
        self.show(&pending);
    }

    fn show(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        let trm = self.tm.then(&self.ctm);
        let size = self.font_size * trm.vertical_scale();
        let width = estimate_width_em(text) * self.font_size * trm.horizontal_scale();
        let (x, baseline) = (trm.e, trm.f);

        let bbox = BBox::new(
            x,
            self.page_height - (baseline + size),
            x + width,
            self.page_height - baseline,
        );

        // Text outside BT/ET is malformed but still shown by viewers
        let block = self.block.get_or_insert_with(BlockBuilder::default);
        block.push_span(TextSpan::new(text, size), baseline, bbox);

        let advance = estimate_width_em(text) * self.font_size;
        self.tm = Matrix::translation(advance, 0.0).then(&self.tm);
    }

    fn end_block(&mut self) {
        if let Some(block) = self.block.take() {
            if let Some(rendered) = block.finish() {
                self.blocks.push(rendered);
            }
        }
    }

    fn finish(mut self) -> Vec<RenderedBlock> {
        self.end_block();
        self.blocks
    }
}
