//! Rewrite text for a reader profile
//!
//! The profile's grade and interests shape a chat prompt for the configured
//! LLM provider. The rewrite is scored with the same readability model as the
//! original so callers can see whether it moved toward the reader's grade.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{ChatMessage, LlmProvider};
use crate::readability::{round_to, ReadabilityReport, ReadabilityScorer};
use crate::types::UserProfile;

/// Used in the prompt when a profile lists no interests
const DEFAULT_INTEREST: &str = "日常生活";

/// Difference between the rewrite and the original, rewrite minus original
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadabilityChange {
    pub flesch_score_change: f64,
    pub grade_level_change: i32,
    pub vocab_coverage_change: f64,
    pub sentence_length_change: f64,
}

impl ReadabilityChange {
    fn between(original: &ReadabilityReport, personalized: &ReadabilityReport) -> Self {
        Self {
            flesch_score_change: round_to(personalized.flesch_score - original.flesch_score, 2),
            grade_level_change: personalized.estimated_grade as i32
                - original.estimated_grade as i32,
            vocab_coverage_change: round_to(
                personalized.vocab_coverage - original.vocab_coverage,
                2,
            ),
            sentence_length_change: round_to(
                personalized.avg_sentence_length - original.avg_sentence_length,
                1,
            ),
        }
    }
}

/// A rewrite with readability before and after
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonalizedText {
    pub user_id: String,
    pub target_grade: u8,
    pub personalized_text: String,
    pub original_readability: ReadabilityReport,
    pub personalized_readability: ReadabilityReport,
    pub improvement: ReadabilityChange,
    pub warnings: Vec<String>,
}

pub struct Personalizer {
    provider: Arc<dyn LlmProvider>,
    scorer: ReadabilityScorer,
}

impl Personalizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            scorer: ReadabilityScorer::new(),
        }
    }

    pub fn scorer(&self) -> &ReadabilityScorer {
        &self.scorer
    }

    /// Rewrite `text` for the reader and score both versions
    pub async fn personalize(
        &self,
        profile: &UserProfile,
        text: &str,
        must_keep_terms: &[String],
    ) -> Result<PersonalizedText> {
        let messages = build_messages(text, profile.grade, &profile.interests, must_keep_terms);

        tracing::info!(
            "Personalizing {} chars for {} (grade {}) with {}",
            text.chars().count(),
            profile.user_id,
            profile.grade,
            self.provider.name()
        );

        let personalized_text = self.provider.chat(&messages).await?.trim().to_string();
        if personalized_text.is_empty() {
            return Err(Error::llm(format!(
                "{} returned an empty rewrite",
                self.provider.name()
            )));
        }

        let original_readability = self.scorer.analyze(text, profile.grade);
        let personalized_readability = self.scorer.analyze(&personalized_text, profile.grade);

        let mut warnings = Vec::new();
        let missing: Vec<&str> = must_keep_terms
            .iter()
            .map(String::as_str)
            .filter(|term| !personalized_text.contains(term))
            .collect();
        if !missing.is_empty() {
            warnings.push(format!("改写结果缺少必须保留的术语：{}", missing.join("、")));
        }
        if personalized_readability.estimated_grade > profile.grade.saturating_add(1) {
            warnings.push(format!(
                "改写结果约为{}年级水平，仍高于目标{}年级",
                personalized_readability.estimated_grade, profile.grade
            ));
        }
        for warning in &warnings {
            tracing::warn!("Personalization for {}: {}", profile.user_id, warning);
        }

        Ok(PersonalizedText {
            user_id: profile.user_id.clone(),
            target_grade: profile.grade,
            improvement: ReadabilityChange::between(
                &original_readability,
                &personalized_readability,
            ),
            personalized_text,
            original_readability,
            personalized_readability,
            warnings,
        })
    }
}

/// System and user messages asking for a grade-level rewrite
pub fn build_messages(
    text: &str,
    grade: u8,
    interests: &[String],
    must_keep_terms: &[String],
) -> Vec<ChatMessage> {
    let interests = if interests.is_empty() {
        DEFAULT_INTEREST.to_string()
    } else {
        interests.join("、")
    };

    let mut system = format!(
        "你是一位中文教育内容改编专家。请把用户提供的文本改写为适合{grade}年级学生阅读的版本。\n\
         要求：\n\
         1. 使用{grade}年级学生熟悉的词汇，句子简短清晰\n\
         2. 结合学生的兴趣（{interests}）举例或打比方\n\
         3. 保留原文的核心概念、事实和段落结构，不要添加错误信息\n\
         4. 只输出改写后的文本"
    );
    if !must_keep_terms.is_empty() {
        system.push_str(&format!("\n\n必须原样保留以下术语：{}", must_keep_terms.join("、")));
    }

    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("原文：\n{}", text)),
    ]
}
