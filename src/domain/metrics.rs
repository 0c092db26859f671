//! Pure aggregation over a task collection.
//!
//! Filtering is the caller's responsibility; these functions only fold over
//! whatever slice they are given. Budget and progress figures are always
//! recomputed live from the task set, never persisted on the project row.

use time::Date;

use crate::domain::normalize::Status;
use crate::domain::task::Task;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub total_weight: u32,
    /// Weighted completion percentage, rounded to one decimal. `0.0` for an
    /// empty collection, never NaN.
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeadlineIndicators {
    /// Not done and due before today.
    pub overdue_count: u32,
    /// Due after the project's end date, regardless of status.
    pub beyond_end_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetIndicators {
    pub sum_expected: f64,
    pub sum_real: f64,
    pub is_over_budget: bool,
}

pub fn compute_progress(tasks: &[Task]) -> Progress {
    let total_weight: u32 = tasks.iter().map(|t| t.weight.value()).sum();
    if total_weight == 0 {
        return Progress { total_weight: 0, percent: 0.0 };
    }
    let done_weight: u32 = tasks
        .iter()
        .filter(|t| t.status == Status::Done)
        .map(|t| t.weight.value())
        .sum();
    let percent = (f64::from(done_weight) / f64::from(total_weight) * 1000.0).round() / 10.0;
    Progress { total_weight, percent }
}

/// 80 points per weight unit, awarded only to done tasks documented with
/// both photos.
pub fn compute_points(tasks: &[Task]) -> u32 {
    tasks
        .iter()
        .filter(|t| t.status == Status::Done && t.has_both_photos())
        .map(|t| 80 * t.weight.value())
        .sum()
}

pub fn task_points(task: &Task) -> u32 {
    80 * task.weight.value()
}

/// Tasks without a due date are ignored by both counters.
pub fn compute_deadline_indicators(
    project_end: Option<Date>,
    today: Date,
    tasks: &[Task],
) -> DeadlineIndicators {
    let mut indicators = DeadlineIndicators::default();
    for task in tasks {
        let Some(due) = task.due_date else { continue };
        if task.status != Status::Done && due < today {
            indicators.overdue_count += 1;
        }
        if let Some(end) = project_end {
            if due > end {
                indicators.beyond_end_count += 1;
            }
        }
    }
    indicators
}

pub fn compute_budget_indicators(tasks: &[Task]) -> BudgetIndicators {
    let sum_expected: f64 = tasks.iter().map(|t| t.cost_expected).sum();
    let sum_real: f64 = tasks.iter().map(|t| t.cost_real).sum();
    BudgetIndicators {
        sum_expected,
        sum_real,
        is_over_budget: sum_real > sum_expected,
    }
}
