//! Block classification by font size and leading marker

use regex::Regex;

use crate::types::BlockType;

/// Default font size at or above which a block is a heading
pub const DEFAULT_HEADING_FONT_THRESHOLD: f32 = 14.0;

/// Labels raw blocks as heading, list or paragraph
#[derive(Debug, Clone)]
pub struct BlockClassifier {
    heading_font_threshold: f32,
    list_pattern: Regex,
}

impl Default for BlockClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HEADING_FONT_THRESHOLD)
    }
}

impl BlockClassifier {
    pub fn new(heading_font_threshold: f32) -> Self {
        // One digit, dash, bullet or mid-dot followed by whitespace
        let list_pattern = Regex::new(r"^\s*[\d\-•·]\s+").expect("Invalid regex");
        Self {
            heading_font_threshold,
            list_pattern,
        }
    }

    pub fn heading_font_threshold(&self) -> f32 {
        self.heading_font_threshold
    }

    /// Classify a block from its text and largest font size
    pub fn classify(&self, text: &str, max_font_size: f32) -> BlockType {
        if max_font_size >= self.heading_font_threshold {
            BlockType::Heading
        } else if self.list_pattern.is_match(text) {
            BlockType::List
        } else {
            BlockType::Paragraph
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_threshold_is_inclusive() {
        let classifier = BlockClassifier::default();
        assert_eq!(classifier.classify("第一章", 14.0), BlockType::Heading);
        assert_eq!(classifier.classify("第一章", 13.999), BlockType::Paragraph);
        assert_eq!(classifier.classify("第一章", 22.0), BlockType::Heading);
    }

    #[test]
    fn test_heading_wins_over_list_marker() {
        let classifier = BlockClassifier::default();
        assert_eq!(classifier.classify("1 概述", 16.0), BlockType::Heading);
    }

    #[test]
    fn test_list_markers() {
        let classifier = BlockClassifier::default();
        for text in ["1 第一项", "- 第二项", "• 第三项", "· 第四项", "  2\t缩进项"] {
            assert_eq!(classifier.classify(text, 12.0), BlockType::List, "{text:?}");
        }
    }

    #[test]
    fn test_non_list_text() {
        let classifier = BlockClassifier::default();
        // Marker must be a single character followed by whitespace
        for text in ["12 个苹果", "1.第一项", "-连字符", "普通段落"] {
            assert_eq!(classifier.classify(text, 12.0), BlockType::Paragraph, "{text:?}");
        }
    }

    #[test]
    fn test_custom_threshold() {
        let classifier = BlockClassifier::new(18.0);
        assert_eq!(classifier.classify("标题", 16.0), BlockType::Paragraph);
        assert_eq!(classifier.classify("标题", 18.0), BlockType::Heading);
    }
}
