use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key assigned by the remote store when a report is first pushed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub String);

impl ReportId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ReportId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity slice of an authenticated user, as supplied by the host's auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub uid: String,
    pub email: String,
}

impl UserRef {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
        }
    }
}

/// Persisted as the integers `0..=2`. The legacy delete signal (`3`) is an
/// action, not a status, and is never written to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ReportStatus {
    Awaiting,
    InProgress,
    Closed,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [
        ReportStatus::Awaiting,
        ReportStatus::InProgress,
        ReportStatus::Closed,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Awaiting),
            1 => Some(Self::InProgress),
            2 => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u8 {
        match self {
            Self::Awaiting => 0,
            Self::InProgress => 1,
            Self::Closed => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Awaiting => "Awaiting Support",
            Self::InProgress => "Being Supported",
            Self::Closed => "Report Closed",
        }
    }
}

impl TryFrom<u8> for ReportStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_raw(value).ok_or_else(|| format!("invalid report status {value}"))
    }
}

impl From<ReportStatus> for u8 {
    fn from(value: ReportStatus) -> Self {
        value.as_raw()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: UserRef,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub urgency: String,
    pub category: String,
    pub status: ReportStatus,
    pub owner: UserRef,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Comment 0 carries the report's original description.
    pub fn description(&self) -> Option<&str> {
        self.comments.first().map(|comment| comment.text.as_str())
    }
}

/// Authenticated actor plus the externally supplied admin flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user: UserRef,
    pub is_admin: bool,
}

impl Viewer {
    pub fn new(user: UserRef, is_admin: bool) -> Self {
        Self { user, is_admin }
    }

    pub fn uid(&self) -> &str {
        &self.user.uid
    }

    /// Owners and admins may see a report; everyone else gets the hidden state.
    pub fn can_view(&self, report: &Report) -> bool {
        self.is_admin || report.owner.uid == self.user.uid
    }
}

/// Detail-view action. Replaces the legacy scheme where a fourth status value
/// doubled as a delete signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportAction {
    SetStatus(ReportStatus),
    Delete,
}

impl ReportAction {
    /// Maps the legacy numeric action channel: `0..=2` select a status, `3` deletes.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            3 => Some(Self::Delete),
            other => ReportStatus::from_raw(other).map(Self::SetStatus),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_raw_integers() {
        for status in ReportStatus::ALL {
            assert_eq!(ReportStatus::from_raw(status.as_raw()), Some(status));
        }
        assert_eq!(ReportStatus::from_raw(3), None);
    }

    #[test]
    fn status_serializes_as_integer() {
        let json = serde_json::to_value(ReportStatus::InProgress).expect("encode");
        assert_eq!(json, serde_json::json!(1));
        let status: ReportStatus = serde_json::from_value(serde_json::json!(2)).expect("decode");
        assert_eq!(status, ReportStatus::Closed);
        assert!(serde_json::from_value::<ReportStatus>(serde_json::json!(3)).is_err());
    }

    #[test]
    fn raw_action_three_maps_to_delete() {
        assert_eq!(ReportAction::from_raw(3), Some(ReportAction::Delete));
        assert_eq!(
            ReportAction::from_raw(1),
            Some(ReportAction::SetStatus(ReportStatus::InProgress))
        );
        assert_eq!(ReportAction::from_raw(4), None);
    }

    #[test]
    fn viewer_access_covers_owner_and_admin() {
        let owner = UserRef::new("u-1", "owner@example.com");
        let report = Report {
            id: ReportId::from("r-1"),
            title: "Broken printer".into(),
            urgency: "high".into(),
            category: "facilities".into(),
            status: ReportStatus::Awaiting,
            owner: owner.clone(),
            comments: vec![Comment {
                author: owner.clone(),
                text: "It beeps".into(),
                created_at: chrono::Utc::now(),
            }],
            created_at: chrono::Utc::now(),
        };

        assert!(Viewer::new(owner, false).can_view(&report));
        assert!(Viewer::new(UserRef::new("admin", "a@example.com"), true).can_view(&report));
        assert!(!Viewer::new(UserRef::new("u-2", "other@example.com"), false).can_view(&report));
    }
}
