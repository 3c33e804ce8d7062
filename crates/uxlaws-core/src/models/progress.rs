use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Laws the user has marked as learned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub completed_laws: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Progress {
    pub fn is_completed(&self, law_id: &str) -> bool {
        self.completed_laws.iter().any(|id| id == law_id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_laws.len()
    }

    /// Completion as a whole percentage of `total` laws
    pub fn percent_of(&self, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        let pct = (self.completed_count().min(total) * 100) / total;
        pct as u8
    }
}
