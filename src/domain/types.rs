use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intent assigned to a group message by the classification cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentLabel {
    Employer,
    Freelancer,
    Barred,
    Spam,
    Unclear,
    Skip,
}

impl IntentLabel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employer" => Some(Self::Employer),
            "freelancer" => Some(Self::Freelancer),
            "barred" => Some(Self::Barred),
            "spam" => Some(Self::Spam),
            "unclear" => Some(Self::Unclear),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employer => "employer",
            Self::Freelancer => "freelancer",
            Self::Barred => "barred",
            Self::Spam => "spam",
            Self::Unclear => "unclear",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final output of the cascade. Ephemeral: consumed by the handler and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub label: IntentLabel,
    pub reason: Option<String>,
    pub reply: Option<String>,
}

impl Verdict {
    pub fn of(label: IntentLabel) -> Self {
        Self {
            label,
            reason: None,
            reply: None,
        }
    }

    pub fn unclear(reason: impl Into<String>) -> Self {
        Self {
            label: IntentLabel::Unclear,
            reason: Some(reason.into()),
            reply: None,
        }
    }
}

/// Profile data returned by the messaging client for a user id.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        let mut parts = Vec::new();
        if let Some(first) = &self.first_name {
            parts.push(first.as_str());
        }
        if let Some(last) = &self.last_name {
            parts.push(last.as_str());
        }
        parts.join(" ").trim().to_string()
    }
}

/// Cached contact details for a sender, owned by the outreach ledger.
#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub cached_at: DateTime<Utc>,
}

impl ContactRecord {
    pub fn from_profile(user_id: i64, profile: &UserProfile, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username: profile.username.clone(),
            full_name: profile.full_name(),
            cached_at: now,
        }
    }

    pub fn is_fresh(&self, window: Duration, now: DateTime<Utc>) -> bool {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(self.cached_at) < window
    }

    /// Username when known, otherwise the full name.
    pub fn display_name(&self) -> &str {
        match &self.username {
            Some(username) if !username.is_empty() => username,
            _ => &self.full_name,
        }
    }
}
