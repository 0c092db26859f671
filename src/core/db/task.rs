//! Task repository.

use std::future::Future;
use std::path::Path;

use crate::domain::normalize::{Status, TaskPatch};
use crate::domain::scope::ScopeRef;
use crate::domain::task::{NewTask, Task};
use crate::error::Result;

/// Which of the two documentation photos to attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSlot {
    Before,
    After,
}

pub trait TaskRepository {
    /// Project-wide listing; scope filtering happens in memory, on the
    /// caller's side.
    fn get_tasks(&self) -> impl Future<Output = Result<Vec<Task>>>;
    fn get_tasks_by_scope(&self, scope: ScopeRef) -> impl Future<Output = Result<Vec<Task>>>;
    fn get_task_by_id(&self, id: i64) -> impl Future<Output = Result<Option<Task>>>;
    fn add_task(&self, task: &NewTask) -> impl Future<Output = Result<Task>>;
    fn update_task(&self, id: i64, patch: &TaskPatch) -> impl Future<Output = Result<Task>>;
    fn update_task_status(&self, id: i64, status: Status) -> impl Future<Output = Result<Task>>;
    /// Stores the photo file inside the project archive and flips the
    /// corresponding flag.
    fn attach_task_photo(
        &self,
        id: i64,
        slot: PhotoSlot,
        source: &Path,
    ) -> impl Future<Output = Result<Task>>;
    fn delete_task(&self, id: i64) -> impl Future<Output = Result<()>>;
}
