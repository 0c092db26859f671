//! Task entity and its status workflow.

use time::Date;

use crate::domain::normalize::{MoveDirection, Status, Weight};
use crate::domain::scope::{AreaId, ScopeRef, TaskId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    /// Always the area transitively containing the scope node, denormalized
    /// so "all tasks under this room" stays a single indexed query.
    pub area_id: AreaId,
    pub scope: ScopeRef,
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub status: Status,
    pub weight: Weight,
    pub due_date: Option<Date>,
    pub cost_expected: f64,
    pub cost_real: f64,
    pub has_photo_before: bool,
    pub has_photo_after: bool,
    /// Stored filenames inside the project's photo directory.
    pub photo_before_fname: Option<String>,
    pub photo_after_fname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub area_id: AreaId,
    pub scope: ScopeRef,
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub status: Status,
    pub weight: Weight,
    pub due_date: Option<Date>,
    pub cost_expected: f64,
    pub cost_real: f64,
}

impl Task {
    pub fn has_both_photos(&self) -> bool {
        self.has_photo_before && self.has_photo_after
    }

    /// The status one step away in the given direction, or `None` at the
    /// board's edge (a no-op for callers, not an error).
    pub fn next_status(&self, direction: MoveDirection) -> Option<Status> {
        self.status.step(direction)
    }

    /// Guard for an explicit transition: one step at a time, and `done`
    /// needs both the before and after photo.
    pub fn check_transition(&self, next: Status) -> Result<()> {
        if !self.status.is_adjacent(next) {
            return Err(Error::validation(format!(
                "cannot move from '{}' straight to '{}'",
                self.status.as_str(),
                next.as_str()
            )));
        }
        if next == Status::Done && !self.has_both_photos() {
            return Err(Error::validation(
                "add before/after photos before completing the task",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scope::ScopeType;

    fn task(status: Status, before: bool, after: bool) -> Task {
        Task {
            id: 1,
            area_id: 1,
            scope: ScopeRef { scope_type: ScopeType::Area, scope_id: 1 },
            title: "Sand the door".into(),
            description: None,
            task_type: None,
            status,
            weight: Weight::Medium,
            due_date: None,
            cost_expected: 0.0,
            cost_real: 0.0,
            has_photo_before: before,
            has_photo_after: after,
            photo_before_fname: None,
            photo_after_fname: None,
        }
    }

    #[test]
    fn done_requires_both_photos() {
        let t = task(Status::Doing, true, false);
        let err = t.check_transition(Status::Done).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(t.status, Status::Doing, "task keeps its prior state");

        let t = task(Status::Doing, true, true);
        assert!(t.check_transition(Status::Done).is_ok());
    }

    #[test]
    fn no_skipping_levels() {
        let t = task(Status::Todo, true, true);
        assert!(t.check_transition(Status::Done).is_err());
        assert!(t.check_transition(Status::Doing).is_ok());
    }

    #[test]
    fn reverse_moves_are_unconditional() {
        let t = task(Status::Done, false, false);
        assert!(t.check_transition(Status::Doing).is_ok());
        assert_eq!(t.next_status(MoveDirection::Forward), None);
        assert_eq!(t.next_status(MoveDirection::Back), Some(Status::Doing));
    }
}
