use crate::error::{Result, TakedownError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Platforms offered by the submit form. Anything else is free text.
pub const DEFAULT_PLATFORMS: [&str; 5] = ["Stripchat", "Google", "XVideos", "Pornhub", "Other"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    Pending,
    Submitted,
    Removed,
    Failed,
}

impl UrlStatus {
    pub const ALL: [UrlStatus; 4] = [
        UrlStatus::Pending,
        UrlStatus::Submitted,
        UrlStatus::Removed,
        UrlStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlStatus::Pending => "pending",
            UrlStatus::Submitted => "submitted",
            UrlStatus::Removed => "removed",
            UrlStatus::Failed => "failed",
        }
    }

    pub fn parse_status(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(UrlStatus::Pending),
            "submitted" => Some(UrlStatus::Submitted),
            "removed" => Some(UrlStatus::Removed),
            "failed" => Some(UrlStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UrlStatus::Removed | UrlStatus::Failed)
    }

    /// The only legal edges are `pending -> submitted` and
    /// `submitted -> removed | failed`. Same-state requests are rejected.
    pub fn can_transition_to(&self, next: UrlStatus) -> bool {
        matches!(
            (*self, next),
            (UrlStatus::Pending, UrlStatus::Submitted)
                | (UrlStatus::Submitted, UrlStatus::Removed)
                | (UrlStatus::Submitted, UrlStatus::Failed)
        )
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for UrlStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        UrlStatus::parse_status(&s.trim().to_ascii_lowercase()).ok_or_else(|| {
            format!("unknown status '{s}' (expected pending|submitted|removed|failed)")
        })
    }
}

/// Which platform labels are suggested, and whether anything else is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPolicy {
    pub suggested: Vec<String>,
    pub allow_custom: bool,
}

impl Default for PlatformPolicy {
    fn default() -> Self {
        Self {
            suggested: DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect(),
            allow_custom: true,
        }
    }
}

/// A validated target platform label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlatform {
    label: String,
    suggested: bool,
}

impl TargetPlatform {
    /// Trims the label and matches it case-insensitively against the
    /// suggested list, adopting the suggested spelling on a match.
    pub fn parse(label: &str, policy: &PlatformPolicy) -> Result<Self> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(TakedownError::Validation(
                "target platform must be non-empty".into(),
            ));
        }
        if let Some(known) = policy
            .suggested
            .iter()
            .find(|p| p.eq_ignore_ascii_case(trimmed))
        {
            return Ok(Self {
                label: known.clone(),
                suggested: true,
            });
        }
        if !policy.allow_custom {
            return Err(TakedownError::Validation(format!(
                "unrecognized target platform '{trimmed}'"
            )));
        }
        Ok(Self {
            label: trimmed.to_string(),
            suggested: false,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }

    pub fn is_suggested(&self) -> bool {
        self.suggested
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestBatch {
    pub id: Uuid,
    pub owner: String,
    pub target_platform: String,
    pub url_count: i64,
    /// Derived from the batch's URLs at read time.
    pub status: UrlStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestUrl {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub sequence: i64,
    pub url: String,
    pub status: UrlStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub removed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-status URL counts for one batch or one owner.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub submitted: i64,
    pub removed: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = UrlStatus>,
    {
        let mut counts = Self::default();
        for status in statuses {
            counts.add(status, 1);
        }
        counts
    }

    pub fn add(&mut self, status: UrlStatus, n: i64) {
        match status {
            UrlStatus::Pending => self.pending += n,
            UrlStatus::Submitted => self.submitted += n,
            UrlStatus::Removed => self.removed += n,
            UrlStatus::Failed => self.failed += n,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.submitted + self.removed + self.failed
    }

    /// Reports the most unfinished status present: pending, then submitted,
    /// then failed, and removed only when every URL is removed.
    /// A batch without URLs reports pending.
    pub fn aggregate(&self) -> UrlStatus {
        if self.pending > 0 || self.total() == 0 {
            UrlStatus::Pending
        } else if self.submitted > 0 {
            UrlStatus::Submitted
        } else if self.failed > 0 {
            UrlStatus::Failed
        } else {
            UrlStatus::Removed
        }
    }
}

/// Dashboard counters. Failed URLs count toward `total` but not toward
/// `submitted`, `removed` or `pending`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlStats {
    pub total: i64,
    pub submitted: i64,
    pub removed: i64,
    pub pending: i64,
    pub failed: i64,
}

impl From<StatusCounts> for UrlStats {
    fn from(c: StatusCounts) -> Self {
        Self {
            total: c.total(),
            submitted: c.submitted,
            removed: c.removed,
            pending: c.pending,
            failed: c.failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsScope {
    Owner(String),
    Global,
}
