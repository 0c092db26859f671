//! Completion-bonus idempotency ledger.
//!
//! Keyed per (user, project) so awards never leak across projects. The
//! ledger is a plain JSON map task-id -> scored, stored through the durable
//! key-value collaborator. Losing that storage can cause at most one
//! duplicate award per task on the next completion; that trade-off is
//! accepted and documented rather than silently wrong.
//!
//! Ordering contract for callers: apply the lifetime-points mutation FIRST
//! and mark the task scored only after it succeeds. A failed mutation leaves
//! the ledger unmarked, so a retry can safely re-attempt the award.

use std::collections::BTreeMap;

use crate::domain::scope::TaskId;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PointsLedger {
    user_id: String,
    project_id: String,
    scored: BTreeMap<String, bool>,
}

impl PointsLedger {
    pub fn storage_key(user_id: &str, project_id: &str) -> String {
        format!("points_{user_id}_{project_id}")
    }

    /// Load from a raw KV value. An absent or unreadable value yields an
    /// empty ledger; corruption here must never block completing tasks.
    pub fn from_stored(user_id: &str, project_id: &str, raw: Option<&str>) -> Self {
        let scored = raw
            .and_then(|json| match serde_json::from_str(json) {
                Ok(map) => Some(map),
                Err(err) => {
                    tracing::warn!(%err, "unreadable points ledger, starting empty");
                    None
                }
            })
            .unwrap_or_default();
        PointsLedger {
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            scored,
        }
    }

    pub fn key(&self) -> String {
        Self::storage_key(&self.user_id, &self.project_id)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.scored)?)
    }

    pub fn has_been_scored(&self, task_id: TaskId) -> bool {
        self.scored
            .get(&task_id.to_string())
            .copied()
            .unwrap_or(false)
    }

    pub fn mark_scored(&mut self, task_id: TaskId) {
        self.scored.insert(task_id.to_string(), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_are_per_task_and_survive_round_trip() {
        let mut ledger = PointsLedger::from_stored("user-1", "proj-1", None);
        assert!(!ledger.has_been_scored(42));
        ledger.mark_scored(42);
        assert!(ledger.has_been_scored(42));
        assert!(!ledger.has_been_scored(43));

        let json = ledger.to_json().unwrap();
        let reloaded = PointsLedger::from_stored("user-1", "proj-1", Some(&json));
        assert!(reloaded.has_been_scored(42));
        assert_eq!(reloaded.key(), "points_user-1_proj-1");
    }

    #[test]
    fn corrupt_storage_degrades_to_empty() {
        let ledger = PointsLedger::from_stored("u", "p", Some("{not json"));
        assert!(!ledger.has_been_scored(1));
    }
}
