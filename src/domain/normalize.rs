//! Canonical task status and weight values, plus the boundary that turns
//! free-form user input into them.
//!
//! The synonym tables accept the Portuguese and English spellings found in
//! imported project data. They live only here: everything past this module
//! works with the closed enums, and every write path (task create, task
//! patch, status move) must go through them so the storage CHECK constraints
//! can never be hit with a raw synonym.

use time::Date;

use crate::domain::scope::ScopeRef;
use crate::domain::task::NewTask;
use crate::error::{Error, Result};

pub const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Todo,
    Doing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weight {
    Light,
    Medium,
    Heavy,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Doing => "doing",
            Status::Done => "done",
        }
    }

    /// Canonical values only, as stored in the database.
    pub fn from_canonical(value: &str) -> Result<Self> {
        match value {
            "todo" => Ok(Status::Todo),
            "doing" => Ok(Status::Doing),
            "done" => Ok(Status::Done),
            other => Err(Error::validation(format!("invalid status '{other}'"))),
        }
    }

    /// Free-form input: trim, lowercase, synonym table. `None` means the
    /// caller must treat the value as a validation failure.
    pub fn parse_synonym(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "todo" | "to do" | "to-do" | "a fazer" | "backlog" => Some(Status::Todo),
            "doing" | "em andamento" | "fazendo" => Some(Status::Doing),
            "done" | "concluido" | "concluído" | "feito" => Some(Status::Done),
            _ => None,
        }
    }

    fn index(self) -> i8 {
        match self {
            Status::Todo => 0,
            Status::Doing => 1,
            Status::Done => 2,
        }
    }

    /// One step along `todo <-> doing <-> done`. `None` at either end.
    pub fn step(self, direction: MoveDirection) -> Option<Status> {
        let next = match direction {
            MoveDirection::Back => self.index() - 1,
            MoveDirection::Forward => self.index() + 1,
        };
        match next {
            0 => Some(Status::Todo),
            1 => Some(Status::Doing),
            2 => Some(Status::Done),
            _ => None,
        }
    }

    pub fn is_adjacent(self, other: Status) -> bool {
        (self.index() - other.index()).abs() == 1
    }
}

impl Weight {
    pub fn as_str(self) -> &'static str {
        match self {
            Weight::Light => "light",
            Weight::Medium => "medium",
            Weight::Heavy => "heavy",
        }
    }

    pub fn from_canonical(value: &str) -> Result<Self> {
        match value {
            "light" => Ok(Weight::Light),
            "medium" => Ok(Weight::Medium),
            "heavy" => Ok(Weight::Heavy),
            other => Err(Error::validation(format!("invalid weight '{other}'"))),
        }
    }

    pub fn parse_synonym(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "light" | "leve" => Some(Weight::Light),
            "medium" | "medio" | "médio" | "normal" => Some(Weight::Medium),
            "heavy" | "pesado" | "alta" | "alto" => Some(Weight::Heavy),
            _ => None,
        }
    }

    /// Progress/points multiplier.
    pub fn value(self) -> u32 {
        match self {
            Weight::Light => 1,
            Weight::Medium => 2,
            Weight::Heavy => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Back,
    Forward,
}

/// Raw task form fields, exactly as they arrive from the outside.
#[derive(Debug, Clone, Default)]
pub struct TaskForm {
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub status: Option<String>,
    pub weight: Option<String>,
    pub due_date: Option<String>,
    pub cost_expected: Option<f64>,
}

/// Whitelisted patch fields; anything not listed here cannot be updated
/// through the generic edit path.
#[derive(Debug, Clone, Default)]
pub struct TaskPatchForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub status: Option<String>,
    pub weight: Option<String>,
    pub due_date: Option<String>,
    pub cost_expected: Option<f64>,
    pub cost_real: Option<f64>,
}

/// Normalized patch ready for storage.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub status: Option<Status>,
    pub weight: Option<Weight>,
    pub due_date: Option<Option<Date>>,
    pub cost_expected: Option<f64>,
    pub cost_real: Option<f64>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.task_type.is_none()
            && self.status.is_none()
            && self.weight.is_none()
            && self.due_date.is_none()
            && self.cost_expected.is_none()
            && self.cost_real.is_none()
    }
}

fn parse_due_date(raw: &str) -> Result<Option<Date>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Date::parse(trimmed, DATE_FORMAT)
        .map(Some)
        .map_err(|_| Error::validation(format!("invalid due date '{trimmed}' (expected YYYY-MM-DD)")))
}

/// Build an insert payload. The scope must already be resolved by the
/// caller; an empty title fails before any storage call. Absent status and
/// weight default to `todo`/`medium`, present-but-unknown values are
/// rejected, and unset costs are zeroed.
pub fn build_task_draft(form: &TaskForm, scope: ScopeRef, area_id: i64) -> Result<NewTask> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(Error::validation("task title must not be empty"));
    }

    let status = match form.status.as_deref() {
        None => Status::Todo,
        Some(raw) => Status::parse_synonym(raw)
            .ok_or_else(|| Error::validation(format!("invalid status '{}'", raw.trim())))?,
    };
    let weight = match form.weight.as_deref() {
        None => Weight::Medium,
        Some(raw) => Weight::parse_synonym(raw)
            .ok_or_else(|| Error::validation(format!("invalid weight '{}'", raw.trim())))?,
    };
    let due_date = match form.due_date.as_deref() {
        None => None,
        Some(raw) => parse_due_date(raw)?,
    };

    Ok(NewTask {
        area_id,
        scope,
        title: title.to_string(),
        description: clean_optional(form.description.as_deref()),
        task_type: clean_optional(form.task_type.as_deref()),
        status,
        weight,
        due_date,
        cost_expected: form.cost_expected.unwrap_or(0.0),
        cost_real: 0.0,
    })
}

/// Build an update payload. Each present field is normalized independently;
/// one invalid value fails the whole patch, nothing is partially applied.
pub fn build_task_patch(form: &TaskPatchForm) -> Result<TaskPatch> {
    let mut patch = TaskPatch::default();

    if let Some(title) = form.title.as_deref() {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("task title must not be empty"));
        }
        patch.title = Some(title.to_string());
    }
    if let Some(raw) = form.status.as_deref() {
        let status = Status::parse_synonym(raw)
            .ok_or_else(|| Error::validation(format!("invalid status '{}'", raw.trim())))?;
        patch.status = Some(status);
    }
    if let Some(raw) = form.weight.as_deref() {
        let weight = Weight::parse_synonym(raw)
            .ok_or_else(|| Error::validation(format!("invalid weight '{}'", raw.trim())))?;
        patch.weight = Some(weight);
    }
    if let Some(raw) = form.due_date.as_deref() {
        patch.due_date = Some(parse_due_date(raw)?);
    }
    patch.description = form.description.clone();
    patch.task_type = form.task_type.clone();
    patch.cost_expected = form.cost_expected;
    patch.cost_real = form.cost_real;

    Ok(patch)
}

fn clean_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scope::ScopeType;

    #[test]
    fn status_synonyms_map_to_canonical_values() {
        let todo = ["todo", "to do", "to-do", "a fazer", "backlog", " TODO "];
        let doing = ["doing", "em andamento", "Fazendo"];
        let done = ["done", "concluido", "CONCLUÍDO", "feito"];
        for raw in todo {
            assert_eq!(Status::parse_synonym(raw), Some(Status::Todo), "{raw}");
        }
        for raw in doing {
            assert_eq!(Status::parse_synonym(raw), Some(Status::Doing), "{raw}");
        }
        for raw in done {
            assert_eq!(Status::parse_synonym(raw), Some(Status::Done), "{raw}");
        }
    }

    #[test]
    fn unknown_status_is_rejected_not_coerced() {
        for raw in ["", "   ", "finished", "em pausa", "done!"] {
            assert_eq!(Status::parse_synonym(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn weight_synonyms_map_to_canonical_values() {
        assert_eq!(Weight::parse_synonym("leve"), Some(Weight::Light));
        assert_eq!(Weight::parse_synonym("MÉDIO"), Some(Weight::Medium));
        assert_eq!(Weight::parse_synonym("normal"), Some(Weight::Medium));
        assert_eq!(Weight::parse_synonym("pesado "), Some(Weight::Heavy));
        assert_eq!(Weight::parse_synonym("alta"), Some(Weight::Heavy));
        assert_eq!(Weight::parse_synonym("enorme"), None);
        assert_eq!(Weight::parse_synonym(""), None);
    }

    #[test]
    fn status_steps_one_at_a_time() {
        assert_eq!(Status::Todo.step(MoveDirection::Forward), Some(Status::Doing));
        assert_eq!(Status::Doing.step(MoveDirection::Forward), Some(Status::Done));
        assert_eq!(Status::Done.step(MoveDirection::Forward), None);
        assert_eq!(Status::Done.step(MoveDirection::Back), Some(Status::Doing));
        assert_eq!(Status::Todo.step(MoveDirection::Back), None);
        assert!(!Status::Todo.is_adjacent(Status::Done));
    }

    #[test]
    fn draft_defaults_and_title_requirement() {
        let scope = ScopeRef { scope_type: ScopeType::Area, scope_id: 1 };
        let form = TaskForm { title: "  Paint wall  ".into(), ..TaskForm::default() };
        let draft = build_task_draft(&form, scope, 1).unwrap();
        assert_eq!(draft.title, "Paint wall");
        assert_eq!(draft.status, Status::Todo);
        assert_eq!(draft.weight, Weight::Medium);
        assert_eq!(draft.cost_expected, 0.0);
        assert_eq!(draft.cost_real, 0.0);

        let empty = TaskForm { title: "   ".into(), ..TaskForm::default() };
        assert!(matches!(
            build_task_draft(&empty, scope, 1),
            Err(crate::Error::Validation(_))
        ));
    }

    #[test]
    fn patch_rejects_invalid_weight_wholesale() {
        let form = TaskPatchForm {
            title: Some("New title".into()),
            weight: Some("gigante".into()),
            ..TaskPatchForm::default()
        };
        assert!(matches!(build_task_patch(&form), Err(crate::Error::Validation(_))));
    }

    #[test]
    fn patch_normalizes_present_fields_only() {
        let form = TaskPatchForm {
            status: Some("em andamento".into()),
            due_date: Some("2026-09-01".into()),
            ..TaskPatchForm::default()
        };
        let patch = build_task_patch(&form).unwrap();
        assert_eq!(patch.status, Some(Status::Doing));
        assert!(patch.title.is_none());
        assert!(patch.weight.is_none());
        let due = patch.due_date.unwrap().unwrap();
        assert_eq!((due.year(), due.month() as u8, due.day()), (2026, 9, 1));
    }
}
