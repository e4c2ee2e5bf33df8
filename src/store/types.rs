use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::schema::WorkoutSet;

/// Load state of the store. Sync progress is tracked separately in `SyncStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLifecycle {
    Uninitialized,
    Loading,
    Ready,
}

/// Outcome of the most recent sync attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub pending_changes: u32,
    pub sync_error: Option<String>,
}

impl SyncStatus {
    /// Short badge text for the status indicator.
    pub fn label(&self, now: DateTime<Utc>) -> String {
        if self.sync_error.is_some() {
            return "Sync error".to_string();
        }
        if !self.is_online {
            return "Offline".to_string();
        }

        match self.last_sync {
            Some(last) => {
                let minutes = (now - last).num_minutes().max(0);
                if minutes == 0 {
                    "Just synced".to_string()
                } else if minutes < 60 {
                    format!("{}m ago", minutes)
                } else {
                    "Synced".to_string()
                }
            }
            None => "Online".to_string(),
        }
    }
}

/// Partial update of a draft entry. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryUpdate {
    pub sets: Option<Vec<WorkoutSet>>,
    pub custom_trackers: Option<BTreeMap<String, String>>,
}

/// Single-field edit of one set.
#[derive(Debug, Clone, PartialEq)]
pub enum SetUpdate {
    Weight(f64),
    Reps(u32),
    CustomValue { tracker: String, value: String },
    ClearCustomValue { tracker: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn online(last_sync: Option<DateTime<Utc>>) -> SyncStatus {
        SyncStatus {
            is_online: true,
            last_sync,
            ..SyncStatus::default()
        }
    }

    #[test]
    fn test_label_prefers_error() {
        let status = SyncStatus {
            sync_error: Some("boom".to_string()),
            ..online(Some(Utc::now()))
        };
        assert_eq!(status.label(Utc::now()), "Sync error");
    }

    #[test]
    fn test_label_offline() {
        assert_eq!(SyncStatus::default().label(Utc::now()), "Offline");
    }

    #[test]
    fn test_label_relative_times() {
        let now = Utc::now();

        assert_eq!(online(None).label(now), "Online");
        assert_eq!(online(Some(now)).label(now), "Just synced");
        assert_eq!(online(Some(now - Duration::minutes(5))).label(now), "5m ago");
        assert_eq!(online(Some(now - Duration::hours(2))).label(now), "Synced");
    }

    #[test]
    fn test_sync_status_serializes_camel_case() {
        let json = serde_json::to_string(&SyncStatus::default()).unwrap();
        assert!(json.contains("\"isOnline\":false"));
        assert!(json.contains("\"pendingChanges\":0"));
        assert!(json.contains("\"syncError\":null"));
    }
}
