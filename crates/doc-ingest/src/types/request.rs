//! Request types for ingestion and analysis

use serde::{Deserialize, Serialize};

use crate::config::{ChunkingConfig, LayoutConfig};

/// Largest accepted target chunk size, in characters
pub const MAX_TARGET_CHUNK_SIZE: usize = 100_000;

/// Per-invocation overrides for the ingestion pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestOptions {
    /// Heading font threshold (overrides config)
    #[serde(default)]
    pub heading_font_threshold: Option<f32>,

    /// Target chunk size in characters (overrides config)
    #[serde(default)]
    pub target_chunk_size: Option<usize>,

    /// Chunk overlap in characters (overrides config)
    #[serde(default)]
    pub chunk_overlap: Option<usize>,

    /// Skip embedding and indexing, stop after chunking
    #[serde(default)]
    pub skip_embedding: bool,
}

impl IngestOptions {
    pub fn with_target_chunk_size(mut self, size: usize) -> Self {
        self.target_chunk_size = Some(size);
        self
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = Some(overlap);
        self
    }

    pub fn with_heading_font_threshold(mut self, threshold: f32) -> Self {
        self.heading_font_threshold = Some(threshold);
        self
    }

    /// Apply overrides on top of the configured layout settings
    pub fn resolve_layout(&self, base: &LayoutConfig) -> LayoutConfig {
        LayoutConfig {
            heading_font_threshold: self
                .heading_font_threshold
                .unwrap_or(base.heading_font_threshold),
            ..base.clone()
        }
    }

    /// Apply overrides on top of the configured chunking settings
    pub fn resolve_chunking(&self, base: &ChunkingConfig) -> ChunkingConfig {
        ChunkingConfig {
            target_chunk_size: self.target_chunk_size.unwrap_or(base.target_chunk_size),
            chunk_overlap: self.chunk_overlap.unwrap_or(base.chunk_overlap),
            ..base.clone()
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        match self.target_chunk_size {
            Some(0) => {
                return Err(crate::Error::validation("target_chunk_size must be greater than 0"));
            }
            Some(size) if size > MAX_TARGET_CHUNK_SIZE => {
                return Err(crate::Error::validation(format!(
                    "target_chunk_size must be at most {}, got {}",
                    MAX_TARGET_CHUNK_SIZE, size
                )));
            }
            _ => {}
        }
        if let Some(threshold) = self.heading_font_threshold {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(crate::Error::validation(
                    "heading_font_threshold must be a positive number",
                ));
            }
        }
        Ok(())
    }
}

/// Readability analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadabilityRequest {
    /// Text to analyze
    pub text: String,
    /// Target reading grade (1-12)
    pub target_grade: u8,
}

impl ReadabilityRequest {
    pub fn validate(&self) -> crate::Result<()> {
        if self.text.trim().is_empty() {
            return Err(crate::Error::validation("text must not be empty"));
        }
        if !(1..=12).contains(&self.target_grade) {
            return Err(crate::Error::validation(format!(
                "target_grade must be between 1 and 12, got {}",
                self.target_grade
            )));
        }
        Ok(())
    }
}

/// Personalization request: inline text, or a chunk already in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizeRequest {
    pub user_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    /// Terms the rewrite must keep verbatim
    #[serde(default)]
    pub must_keep_terms: Vec<String>,
}

impl PersonalizeRequest {
    pub fn validate(&self) -> crate::Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(crate::Error::validation("user_id must not be empty"));
        }
        match (&self.text, &self.filename, &self.chunk_id) {
            (Some(text), None, None) if text.trim().is_empty() => {
                Err(crate::Error::validation("text must not be empty"))
            }
            (Some(_), None, None) | (None, Some(_), Some(_)) => Ok(()),
            _ => Err(crate::Error::validation(
                "provide either text or both filename and chunk_id",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_fall_back_to_config() {
        let base = ChunkingConfig::default();
        let resolved = IngestOptions::default()
            .with_chunk_overlap(0)
            .resolve_chunking(&base);
        assert_eq!(resolved.target_chunk_size, 400);
        assert_eq!(resolved.chunk_overlap, 0);
        assert_eq!(resolved.min_block_chars, base.min_block_chars);

        let layout = IngestOptions::default()
            .with_heading_font_threshold(18.0)
            .resolve_layout(&LayoutConfig::default());
        assert_eq!(layout.heading_font_threshold, 18.0);
        assert!(layout.skip_header_footer);
    }

    #[test]
    fn test_zero_target_size_rejected() {
        let options = IngestOptions::default().with_target_chunk_size(0);
        assert!(options.validate().is_err());
        assert!(IngestOptions::default().validate().is_ok());
    }

    #[test]
    fn test_target_size_upper_bound() {
        let at_limit = IngestOptions::default().with_target_chunk_size(MAX_TARGET_CHUNK_SIZE);
        assert!(at_limit.validate().is_ok());

        let err = IngestOptions::default()
            .with_target_chunk_size(usize::MAX)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("at most"));
    }

    #[test]
    fn test_options_deserialize_partial() {
        let options: IngestOptions = serde_json::from_str(r#"{"chunk_overlap": 20}"#).unwrap();
        assert_eq!(options.chunk_overlap, Some(20));
        assert_eq!(options.target_chunk_size, None);
        assert!(!options.skip_embedding);
    }

    #[test]
    fn test_readability_request_bounds() {
        let request = |text: &str, target_grade| ReadabilityRequest {
            text: text.to_string(),
            target_grade,
        };
        assert!(request("小猫在睡觉。", 3).validate().is_ok());
        assert!(request("  ", 3).validate().is_err());
        assert!(request("小猫在睡觉。", 0).validate().is_err());
        assert!(request("小猫在睡觉。", 13).validate().is_err());
    }

    #[test]
    fn test_personalize_request_needs_one_source() {
        let parse = |body: &str| serde_json::from_str::<PersonalizeRequest>(body).unwrap();

        assert!(parse(r#"{"user_id": "u1", "text": "恐龙"}"#).validate().is_ok());
        assert!(parse(r#"{"user_id": "u1", "filename": "a.pdf", "chunk_id": "chunk_0000"}"#)
            .validate()
            .is_ok());
        assert!(parse(r#"{"user_id": "u1"}"#).validate().is_err());
        assert!(parse(r#"{"user_id": "u1", "filename": "a.pdf"}"#).validate().is_err());
        assert!(parse(r#"{"user_id": "u1", "text": " "}"#).validate().is_err());
        assert!(parse(r#"{"user_id": "", "text": "恐龙"}"#).validate().is_err());
        assert!(
            parse(r#"{"user_id": "u1", "text": "恐龙", "filename": "a.pdf", "chunk_id": "c"}"#)
                .validate()
                .is_err()
        );
    }
}
