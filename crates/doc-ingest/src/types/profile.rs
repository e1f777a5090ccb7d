//! Reader profile types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Highest supported school grade
pub const MAX_GRADE: u8 = 12;
/// Maximum number of interests on a profile
pub const MAX_INTERESTS: usize = 10;

/// Create-or-update request for a reader profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCreate {
    pub user_id: String,
    /// School grade 1-12
    pub grade: u8,
    /// 1-10 interests
    pub interests: Vec<String>,
}

impl ProfileCreate {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::validation("user_id must not be empty"));
        }
        if !(1..=MAX_GRADE).contains(&self.grade) {
            return Err(Error::validation(format!(
                "grade must be between 1 and {}, got {}",
                MAX_GRADE, self.grade
            )));
        }
        if self.interests.is_empty() || self.interests.len() > MAX_INTERESTS {
            return Err(Error::validation(format!(
                "interests must contain 1 to {} entries, got {}",
                MAX_INTERESTS,
                self.interests.len()
            )));
        }
        Ok(())
    }
}

/// Stored reader profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub grade: u8,
    pub interests: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
