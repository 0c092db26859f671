//! Project-level metadata.

use std::future::Future;

use time::{Date, OffsetDateTime};

use crate::error::Result;

/// One project per file; these fields live in the metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Stable identifier, generated on first open; keys the points ledger.
    pub id: String,
    pub name: String,
    pub home_type: String,
    pub mode: String,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub budget_expected: f64,
    pub budget_real: f64,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProjectSettings {
    pub name: Option<String>,
    pub home_type: Option<String>,
    pub mode: Option<String>,
    pub start_date: Option<Option<Date>>,
    pub end_date: Option<Option<Date>>,
    pub budget_expected: Option<f64>,
    pub budget_real: Option<f64>,
}

pub trait ProjectRepository {
    fn get_project(&self) -> impl Future<Output = Result<Project>>;
    fn set_project_settings(
        &self,
        settings: UpdateProjectSettings,
    ) -> impl Future<Output = Result<()>>;
}
