//! Block-aware chunking with overlap and oversized-block splitting

use crate::config::ChunkingConfig;
use crate::types::{BlockType, Chunk, CleanBlock};

/// Sentence terminators used to split oversized blocks
const SENTENCE_TERMINATORS: [char; 4] = ['。', '！', '？', '\n'];

/// Folds cleaned blocks into length-bounded chunks
///
/// Lengths are counted in characters. Consecutive chunks share an overlap
/// taken from the tail of the previous chunk's last block, and blocks longer
/// than twice the target are split on sentence boundaries.
#[derive(Debug, Clone)]
pub struct BlockChunker {
    /// Target chunk size in characters
    target_size: usize,
    /// Characters carried into the next chunk
    overlap: usize,
    /// Blocks shorter than this are dropped
    min_block_chars: usize,
}

impl Default for BlockChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

/// Chunk under construction
#[derive(Default)]
struct PendingChunk {
    parts: Vec<CleanBlock>,
    length: usize,
}

impl PendingChunk {
    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn push(&mut self, block: CleanBlock, length: usize) {
        self.length += length;
        self.parts.push(block);
    }

    fn build(&self, index: usize) -> Chunk {
        let text = self
            .parts
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Chunk::new(
            index,
            text,
            self.parts.iter().map(|b| b.page).collect(),
            self.parts.iter().map(|b| b.block_type).collect(),
        )
    }
}

impl BlockChunker {
    pub fn new(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size,
            overlap,
            min_block_chars: 5,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            target_size: config.target_chunk_size,
            overlap: config.chunk_overlap,
            min_block_chars: config.min_block_chars,
        }
    }

    /// Set the minimum block length
    pub fn with_min_block_chars(mut self, min_block_chars: usize) -> Self {
        self.min_block_chars = min_block_chars;
        self
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk the cleaned blocks of a whole document
    pub fn chunk(&self, blocks: &[CleanBlock]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current = PendingChunk::default();

        for block in blocks {
            let block_length = block.char_len();
            if block_length < self.min_block_chars {
                continue;
            }

            if block_length > self.target_size.saturating_mul(2) {
                if !current.is_empty() {
                    chunks.push(current.build(chunks.len()));
                    current = PendingChunk::default();
                }
                for text in self.split_oversized(&block.text) {
                    chunks.push(Chunk::new(
                        chunks.len(),
                        text,
                        vec![block.page],
                        vec![BlockType::Paragraph],
                    ));
                }
                continue;
            }

            if current.length + block_length > self.target_size && !current.is_empty() {
                chunks.push(current.build(chunks.len()));

                let seed = match current.parts.last() {
                    Some(last) if self.overlap > 0 => Some(tail_chars(&last.text, self.overlap)),
                    _ => None,
                };
                current = PendingChunk::default();
                if let Some(seed) = seed {
                    let seed_length = seed.chars().count();
                    current.push(
                        CleanBlock::new(seed, BlockType::Paragraph, block.page),
                        seed_length,
                    );
                }
            }

            current.push(block.clone(), block_length);
        }

        if !current.is_empty() {
            chunks.push(current.build(chunks.len()));
        }

        chunks
    }

    /// Split an oversized block into sentence-bounded pieces of at most
    /// `target_size` characters
    ///
    /// Each sentence keeps its terminator. A single sentence longer than the
    /// target forms its own piece.
    pub fn split_oversized(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for sentence in split_sentences(text) {
            if sentence.trim().is_empty() {
                continue;
            }
            let sentence_len = sentence.chars().count();

            if current_len + sentence_len > self.target_size && !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }

            current.push_str(sentence);
            current_len += sentence_len;
        }

        if !current.is_empty() {
            pieces.push(current);
        }

        pieces
    }
}

/// Cut text after every sentence terminator, keeping the terminator
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        if SENTENCE_TERMINATORS.contains(&c) {
            let end = idx + c.len_utf8();
            sentences.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

/// Last `n` characters of `text`
fn tail_chars(text: &str, n: usize) -> String {
    let len = text.chars().count();
    text.chars().skip(len.saturating_sub(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(text: &str, page: u32) -> CleanBlock {
        CleanBlock::new(text, BlockType::Paragraph, page)
    }

    /// Remove overlap seeds and join, to compare against the source text
    fn reconstruct(chunks: &[Chunk], overlap_len: impl Fn(usize) -> usize) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let skip = overlap_len(i);
                if skip == 0 {
                    c.text.clone()
                } else {
                    // Seed is followed by the "\n" separator
                    c.text.chars().skip(skip + 1).collect()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_empty_input() {
        assert!(BlockChunker::default().chunk(&[]).is_empty());
    }

    #[test]
    fn test_huge_target_size_keeps_blocks_whole() {
        let chunker = BlockChunker::new(usize::MAX, 0);
        let chunks = chunker.chunk(&[para("五个字符串", 1), para("另一个段落", 2)]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "五个字符串\n另一个段落");
        assert_eq!(chunks[0].pages, vec![1, 2]);
    }

    #[test]
    fn test_single_block_at_target_size() {
        let chunker = BlockChunker::new(400, 50);
        let chunks = chunker.chunk(&[para(&"字".repeat(400), 1)]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "chunk_0000");
        assert_eq!(chunks[0].tokens, 400);
    }

    #[test]
    fn test_short_blocks_dropped() {
        let chunker = BlockChunker::new(400, 50);
        let chunks = chunker.chunk(&[para("短", 1), para("四个字符", 1), para("五个字符串", 2)]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "五个字符串");
        assert_eq!(chunks[0].pages, vec![2]);
    }

    #[test]
    fn test_blocks_accumulate_until_target() {
        let chunker = BlockChunker::new(20, 0);
        let blocks = vec![
            CleanBlock::new("第一章 总则概要", BlockType::Heading, 1),
            para("一二三四五六七八九十", 1),
            para("甲乙丙丁戊己庚辛壬癸", 2),
        ];
        let chunks = chunker.chunk(&blocks);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "第一章 总则概要\n一二三四五六七八九十");
        assert_eq!(chunks[0].block_types, vec![BlockType::Heading, BlockType::Paragraph]);
        assert_eq!(chunks[0].pages, vec![1]);
        assert_eq!(chunks[1].text, "甲乙丙丁戊己庚辛壬癸");
        assert_eq!(chunks[1].pages, vec![2]);
    }

    #[test]
    fn test_overlap_seeds_from_last_block_on_trigger_page() {
        let chunker = BlockChunker::new(20, 4);
        let blocks = vec![
            para("一二三四五六七八九十", 1),
            para("甲乙丙丁戊己庚辛壬癸", 1),
            para("子丑寅卯辰巳午未申酉", 3),
        ];
        let chunks = chunker.chunk(&blocks);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "一二三四五六七八九十\n甲乙丙丁戊己庚辛壬癸");
        assert_eq!(chunks[1].text, "庚辛壬癸\n子丑寅卯辰巳午未申酉");
        assert_eq!(chunks[1].block_types, vec![BlockType::Paragraph, BlockType::Paragraph]);
        // Seed is attributed to the page of the block that triggered the flush
        assert_eq!(chunks[1].pages, vec![3]);
    }

    #[test]
    fn test_overlap_longer_than_block_takes_whole_block() {
        let chunker = BlockChunker::new(10, 50);
        let chunks = chunker.chunk(&[para("一二三四五六七八", 1), para("甲乙丙丁戊己庚辛", 1)]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "一二三四五六七八\n甲乙丙丁戊己庚辛");
    }

    #[test]
    fn test_oversized_block_flushes_without_overlap() {
        let chunker = BlockChunker::new(10, 3);
        let long = "一二三四五六七。八九十甲乙丙。丁戊己庚辛壬癸。";
        let blocks = vec![para("开头的段落内容", 1), para(long, 2), para("结尾的段落内容", 2)];
        let chunks = chunker.chunk(&blocks);

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "开头的段落内容",
                "一二三四五六七。",
                "八九十甲乙丙。",
                "丁戊己庚辛壬癸。",
                "结尾的段落内容",
            ]
        );
        assert!(chunks[1..4].iter().all(|c| c.pages == vec![2]));
        assert!(chunks[1..4]
            .iter()
            .all(|c| c.block_types == vec![BlockType::Paragraph]));
    }

    #[test]
    fn test_split_keeps_terminators_and_packs_greedily() {
        let chunker = BlockChunker::new(10, 0);
        let pieces = chunker.split_oversized("一二三。四五！六七八九十甲乙丙丁戊？己庚");
        assert_eq!(pieces, vec!["一二三。四五！", "六七八九十甲乙丙丁戊？", "己庚"]);
        assert_eq!(pieces.concat(), "一二三。四五！六七八九十甲乙丙丁戊？己庚");
    }

    #[test]
    fn test_heading_with_long_paragraph_scenario() {
        let chunker = BlockChunker::new(400, 50);
        let sentence = "这是一个用于测试切分逻辑的长句子内容。";
        let paragraph = sentence.repeat(4000 / sentence.chars().count() + 1);
        let paragraph: String = paragraph.chars().take(4000).collect();

        let blocks = vec![
            CleanBlock::new("第一章 绪论", BlockType::Heading, 1),
            para(&paragraph, 1),
        ];
        let chunks = chunker.chunk(&blocks);

        assert!(chunks.len() > 2);
        assert_eq!(chunks[0].text, "第一章 绪论");
        assert_eq!(chunks[0].block_types, vec![BlockType::Heading]);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, format!("chunk_{:04}", i));
            assert!(chunk.tokens <= 400 + 50, "{} has {}", chunk.chunk_id, chunk.tokens);
        }

        let rebuilt: String = chunks[1..].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, paragraph);
    }

    #[test]
    fn test_content_preserved_and_size_bounded() {
        let chunker = BlockChunker::new(30, 6);
        let texts = [
            "春眠不觉晓处处闻啼鸟",
            "夜来风雨声花落知多少",
            "床前明月光疑是地上霜举头望明月低头思故乡",
            "白日依山尽黄河入海流",
            "欲穷千里目更上一层楼",
        ];
        let blocks: Vec<CleanBlock> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| para(t, i as u32 / 2 + 1))
            .collect();

        let chunks = chunker.chunk(&blocks);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.tokens <= 2 * 30);
        }

        let rebuilt = reconstruct(&chunks, |i| if i == 0 { 0 } else { 6 });
        assert_eq!(rebuilt, texts.join("\n"));
    }

    #[test]
    fn test_deterministic() {
        let chunker = BlockChunker::new(25, 5);
        let blocks: Vec<CleanBlock> = (0..20)
            .map(|i| para(&format!("第{}段的正文内容在这里", i), i / 5 + 1))
            .collect();
        assert_eq!(chunker.chunk(&blocks), chunker.chunk(&blocks));
    }
}
