//! Readability scoring for Chinese text
//!
//! A reading-ease score is derived from average sentence length and the share
//! of complex sentence patterns, then mapped onto a school grade. Vocabulary
//! coverage is measured against cumulative per-grade word lists.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Common words introduced at each grade, starting with grade 1
const GRADE_VOCABULARY: [&[&str]; 5] = [
    &["是", "的", "了", "我", "你", "他", "有", "在", "个", "人"],
    &["说", "会", "到", "来", "去", "看", "吃", "喝", "玩", "学"],
    &["因为", "所以", "但是", "虽然", "如果", "就", "还", "也", "都"],
    &["然而", "而且", "不仅", "因此", "然后", "接着"],
    &["显然", "实际上", "基本上", "事实上", "尤其", "特别", "尽管"],
];

/// Paired conjunctions that mark a complex sentence
const COMPLEX_PATTERNS: [&str; 5] = [
    r"虽然.*但是",
    r"不仅.*而且",
    r"因为.*所以",
    r"如果.*就",
    r"只有.*才",
];

const SENTENCE_TERMINATORS: [char; 3] = ['。', '！', '？'];

/// Coverage below this ratio counts as unfamiliar vocabulary
const MIN_VOCAB_COVERAGE: f64 = 0.7;

/// Average sentence length above which splitting is suggested
const LONG_SENTENCE_CHARS: f64 = 20.0;

/// Readability analysis of one text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadabilityReport {
    /// Reading ease, 0 (hard) to 100 (easy)
    pub flesch_score: f64,
    pub estimated_grade: u8,
    pub confidence: f64,
    /// Share of characters covered by the target grade vocabulary (0-1)
    pub vocab_coverage: f64,
    pub avg_sentence_length: f64,
    pub assessment: String,
    pub suggestions: Vec<String>,
}

/// Sentence and character statistics of a text
struct TextStats {
    cjk_chars: usize,
    sentences: usize,
    complex: usize,
}

impl TextStats {
    fn avg_sentence_length(&self) -> f64 {
        if self.sentences == 0 {
            return 0.0;
        }
        self.cjk_chars as f64 / self.sentences as f64
    }
}

pub struct ReadabilityScorer {
    /// Cumulative vocabulary: entry `g - 1` holds every word up to grade `g`
    vocabulary: Vec<HashSet<&'static str>>,
    longest_word: usize,
    complex_patterns: Vec<Regex>,
}

impl Default for ReadabilityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadabilityScorer {
    pub fn new() -> Self {
        let mut accumulated = HashSet::new();
        let vocabulary = GRADE_VOCABULARY
            .iter()
            .map(|words| {
                accumulated.extend(words.iter().copied());
                accumulated.clone()
            })
            .collect();

        let longest_word = GRADE_VOCABULARY
            .iter()
            .flat_map(|words| words.iter())
            .map(|w| w.chars().count())
            .max()
            .unwrap_or(1);

        Self {
            vocabulary,
            longest_word,
            complex_patterns: COMPLEX_PATTERNS
                .iter()
                .map(|p| Regex::new(p).expect("Invalid regex"))
                .collect(),
        }
    }

    fn stats(&self, text: &str) -> TextStats {
        TextStats {
            cjk_chars: text.chars().filter(|c| is_cjk(*c)).count(),
            sentences: text
                .split(SENTENCE_TERMINATORS)
                .filter(|s| !s.trim().is_empty())
                .count(),
            complex: self
                .complex_patterns
                .iter()
                .map(|p| p.find_iter(text).count())
                .sum(),
        }
    }

    /// Reading ease from 0 to 100, higher is easier
    pub fn reading_ease(&self, text: &str) -> f64 {
        self.score(&self.stats(text))
    }

    fn score(&self, stats: &TextStats) -> f64 {
        if stats.cjk_chars == 0 {
            return 0.0;
        }
        let sentences = stats.sentences.max(1) as f64;
        let avg_sentence_length = stats.cjk_chars as f64 / sentences;
        let complex_ratio = stats.complex as f64 / sentences;

        (100.0 - avg_sentence_length * 1.5 - complex_ratio * 20.0).clamp(0.0, 100.0)
    }

    /// Estimated grade and a confidence between 0 and 0.95
    pub fn estimate_grade(&self, text: &str) -> (u8, f64) {
        grade_for_score(self.reading_ease(text))
    }

    /// Share of CJK characters covered by words known at the target grade
    ///
    /// Words are matched longest first; grades above the last word list use
    /// the full vocabulary.
    pub fn vocab_coverage(&self, text: &str, target_grade: u8) -> f64 {
        let chars: Vec<char> = text.chars().filter(|c| is_cjk(*c)).collect();
        if chars.is_empty() {
            return 0.0;
        }

        let level = (target_grade.max(1) as usize).min(self.vocabulary.len());
        let vocabulary = &self.vocabulary[level - 1];

        let mut covered = 0;
        let mut i = 0;
        while i < chars.len() {
            let max_len = self.longest_word.min(chars.len() - i);
            let matched = (1..=max_len).rev().find(|&len| {
                let word: String = chars[i..i + len].iter().collect();
                vocabulary.contains(word.as_str())
            });
            match matched {
                Some(len) => {
                    covered += len;
                    i += len;
                }
                None => i += 1,
            }
        }

        covered as f64 / chars.len() as f64
    }

    /// Full analysis against a target grade
    pub fn analyze(&self, text: &str, target_grade: u8) -> ReadabilityReport {
        let stats = self.stats(text);
        let score = self.score(&stats);
        let (estimated_grade, confidence) = grade_for_score(score);
        let vocab_coverage = self.vocab_coverage(text, target_grade);
        let avg_sentence_length = stats.avg_sentence_length();

        ReadabilityReport {
            flesch_score: round_to(score, 2),
            estimated_grade,
            confidence: round_to(confidence, 2),
            vocab_coverage: round_to(vocab_coverage, 2),
            avg_sentence_length: round_to(avg_sentence_length, 1),
            assessment: assessment(estimated_grade, target_grade, vocab_coverage),
            suggestions: suggestions(estimated_grade, target_grade, vocab_coverage, avg_sentence_length),
        }
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn grade_for_score(score: f64) -> (u8, f64) {
    let grade = match score {
        s if s >= 80.0 => 1,
        s if s >= 70.0 => 2,
        s if s >= 60.0 => 3,
        s if s >= 50.0 => 4,
        s if s >= 40.0 => 5,
        s if s >= 30.0 => 6,
        _ => 7,
    };
    (grade, (score / 100.0).min(0.95))
}

fn assessment(estimated: u8, target: u8, coverage: f64) -> String {
    let diff = estimated as i32 - target as i32;

    if diff.abs() <= 1 && coverage >= MIN_VOCAB_COVERAGE {
        format!("文本难度适合{}年级学生阅读", target)
    } else if diff > 1 {
        format!("文本难度偏高（约{}年级水平），建议简化", estimated)
    } else if diff < -1 {
        format!("文本难度偏低（约{}年级水平），可适当提升", estimated)
    } else {
        format!("词汇覆盖率较低（{:.1}%），建议调整用词", coverage * 100.0)
    }
}

fn suggestions(estimated: u8, target: u8, coverage: f64, avg_sentence_length: f64) -> Vec<String> {
    let mut suggestions = Vec::new();

    if estimated > target.saturating_add(1) {
        suggestions.push("使用更简单的词汇和表达方式".to_string());
    }
    if avg_sentence_length > LONG_SENTENCE_CHARS {
        suggestions.push("将长句拆分为短句，降低阅读难度".to_string());
    }
    if coverage < MIN_VOCAB_COVERAGE {
        suggestions.push(format!("增加{}年级常用词汇的使用比例", target));
    }
    if suggestions.is_empty() {
        suggestions.push("文本质量良好，保持当前风格".to_string());
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sentences_read_easily() {
        let scorer = ReadabilityScorer::new();
        let report = scorer.analyze("小猫在睡觉。小狗在玩。", 2);

        assert_eq!(report.flesch_score, 93.25);
        assert_eq!(report.estimated_grade, 1);
        assert_eq!(report.confidence, 0.93);
        assert_eq!(report.avg_sentence_length, 4.5);
        assert_eq!(report.vocab_coverage, 0.33);
        assert_eq!(report.assessment, "词汇覆盖率较低（33.3%），建议调整用词");
        assert_eq!(report.suggestions, vec!["增加2年级常用词汇的使用比例"]);
    }

    #[test]
    fn test_complex_patterns_lower_score() {
        let scorer = ReadabilityScorer::new();
        let text = "虽然下雨了，但是我们还是去上学。因为天气冷，所以穿外套。";

        assert_eq!(scorer.reading_ease(text), 62.0);
        assert_eq!(scorer.estimate_grade(text), (3, 0.62));
    }

    #[test]
    fn test_long_sentence_is_hard() {
        let scorer = ReadabilityScorer::new();
        let report = scorer.analyze(&"天".repeat(60), 3);

        assert_eq!(report.flesch_score, 10.0);
        assert_eq!(report.estimated_grade, 7);
        assert_eq!(report.confidence, 0.1);
        assert_eq!(report.assessment, "文本难度偏高（约7年级水平），建议简化");
        assert_eq!(report.suggestions.len(), 3);
    }

    #[test]
    fn test_score_clamped_and_empty_text() {
        let scorer = ReadabilityScorer::new();
        assert_eq!(scorer.reading_ease(&"天".repeat(200)), 0.0);
        assert_eq!(scorer.reading_ease("hello world."), 0.0);
        assert_eq!(scorer.estimate_grade(""), (7, 0.0));
        assert_eq!(scorer.vocab_coverage("", 3), 0.0);
    }

    #[test]
    fn test_vocabulary_is_cumulative() {
        let scorer = ReadabilityScorer::new();
        // "因为" and "所以" enter at grade 3, "是" at grade 1
        let text = "因为是所以";
        assert_eq!(scorer.vocab_coverage(text, 1), 0.2);
        assert_eq!(scorer.vocab_coverage(text, 3), 1.0);
        assert_eq!(scorer.vocab_coverage(text, 12), 1.0);
    }

    #[test]
    fn test_fitting_text() {
        let scorer = ReadabilityScorer::new();
        let report = scorer.analyze("我是人。你是人。他有个人。", 1);
        assert_eq!(report.estimated_grade, 1);
        assert_eq!(report.vocab_coverage, 1.0);
        assert_eq!(report.assessment, "文本难度适合1年级学生阅读");
        assert_eq!(report.suggestions, vec!["文本质量良好，保持当前风格"]);
    }
}
