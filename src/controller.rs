//! Application state and the operations a front end drives.
//!
//! One controller owns the loaded project snapshot, the hierarchy view, the
//! project-wide task cache, and the scope selection. Every mutation follows
//! the same shape: validate and normalize locally, run the storage call
//! under a timeout, and only then update in-memory state and queue events.
//! Storage is never mutated optimistically, so a failed call leaves local
//! state exactly where it was and the operation can be retried.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use futures::future::join_all;
use time::OffsetDateTime;

use crate::core::db::{
    AreaRepository, AreaUpdate, CornerRepository, CornerUpdate, KvStore, NewArea, NewCorner,
    NewSubArea, PhotoSlot, Project, ProjectRepository, SubAreaRepository, SubAreaUpdate,
    TaskRepository, UpdateProjectSettings,
};
use crate::core::identity::{Identity, ProfileStore};
use crate::domain::hierarchy::{Area, Corner, HierarchyView, SubArea};
use crate::domain::metrics::{
    BudgetIndicators, DeadlineIndicators, Progress, compute_budget_indicators,
    compute_deadline_indicators, compute_points, compute_progress, task_points,
};
use crate::domain::normalize::{MoveDirection, TaskForm, TaskPatchForm, build_task_draft, build_task_patch};
use crate::domain::points::PointsLedger;
use crate::domain::scope::{AreaId, CornerId, ScopeRef, ScopeSelection, ScopeType, SubAreaId, TaskId};
use crate::domain::task::Task;
use crate::error::{Error, Result};

/// Where the last scope selection is remembered between sessions.
const LAST_SCOPE_KEY: &str = "last_scope";

pub const DEFAULT_EXTERNAL_TIMEOUT: Duration = Duration::from_secs(15);

/// Everything the controller needs from the storage layer.
pub trait Store:
    ProjectRepository
    + AreaRepository
    + SubAreaRepository
    + CornerRepository
    + TaskRepository
    + KvStore
{
}

impl<T> Store for T where
    T: ProjectRepository
        + AreaRepository
        + SubAreaRepository
        + CornerRepository
        + TaskRepository
        + KvStore
{
}

/// Snapshot of the computed indicators. Progress, points, deadline and
/// budget figures cover the whole project; the label and task count
/// describe the current selection.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub scope_label: String,
    pub task_count: usize,
    pub progress: Progress,
    pub points: u32,
    pub deadlines: DeadlineIndicators,
    pub budget: BudgetIndicators,
}

/// State-change notifications, queued per mutation and drained by the front
/// end. Each carries what a renderer needs without re-querying.
#[derive(Debug, Clone)]
pub enum Event {
    ScopeChanged {
        label: String,
        filter: Option<ScopeRef>,
    },
    HierarchyChanged,
    TasksChanged {
        dashboard: Dashboard,
    },
}

pub struct ProjectController<S, I, P> {
    store: S,
    identity: I,
    profile: P,
    project: Project,
    hierarchy: HierarchyView,
    tasks: Vec<Task>,
    scope: ScopeSelection,
    timeout: Duration,
    events: Vec<Event>,
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::External(anyhow::anyhow!(
            "storage call timed out after {}s",
            limit.as_secs()
        ))),
    }
}

impl<S, I, P> ProjectController<S, I, P>
where
    S: Store,
    I: Identity,
    P: ProfileStore,
{
    /// Fetch the project and hydrate the full hierarchy: areas first, then
    /// sub-areas and corners as two concurrent fan-out batches. Restores the
    /// scope selection remembered in the project file, narrowed to whatever
    /// still exists.
    pub async fn load(store: S, identity: I, profile: P) -> Result<Self> {
        let timeout = DEFAULT_EXTERNAL_TIMEOUT;
        let project = with_timeout(timeout, store.get_project()).await?;
        let areas = with_timeout(timeout, store.get_areas()).await?;

        let sub_areas: Vec<SubArea> = with_timeout(timeout, async {
            let batches = join_all(areas.iter().map(|a| store.list_sub_areas(a.id))).await;
            let mut all = Vec::new();
            for batch in batches {
                all.extend(batch?);
            }
            Ok(all)
        })
        .await?;

        let corners: Vec<Corner> = with_timeout(timeout, async {
            let batches = join_all(sub_areas.iter().map(|sa| store.list_corners(sa.id))).await;
            let mut all = Vec::new();
            for batch in batches {
                all.extend(batch?);
            }
            Ok(all)
        })
        .await?;

        let tasks = with_timeout(timeout, store.get_tasks()).await?;
        let hierarchy = HierarchyView::rebuild(areas, sub_areas, corners);

        let mut scope = match with_timeout(timeout, store.kv_get(LAST_SCOPE_KEY)).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(%err, "unreadable saved scope, starting fresh");
                ScopeSelection::default()
            }),
            None => ScopeSelection::default(),
        };
        scope.narrow_to_valid(&hierarchy);
        scope.normalize(&hierarchy);

        let mut controller = Self {
            store,
            identity,
            profile,
            project,
            hierarchy,
            tasks,
            scope,
            timeout,
            events: Vec::new(),
        };
        controller.emit_scope_changed();
        controller.emit_tasks_changed();
        Ok(controller)
    }

    pub fn with_timeout_limit(mut self, limit: Duration) -> Self {
        self.timeout = limit;
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn hierarchy(&self) -> &HierarchyView {
        &self.hierarchy
    }

    pub fn scope(&self) -> &ScopeSelection {
        &self.scope
    }

    /// Drain queued state-change notifications.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Tasks attached to the selected node. Empty when nothing is selected.
    pub fn scoped_tasks(&self) -> Vec<&Task> {
        match self.scope.filter() {
            Some(filter) => self.tasks.iter().filter(|t| t.scope == filter).collect(),
            None => Vec::new(),
        }
    }

    pub fn all_tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Indicators always fold over the project-wide task cache; working in
    /// one corner must not hide progress made elsewhere.
    pub fn dashboard(&self) -> Dashboard {
        let today = OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .date();
        Dashboard {
            scope_label: self.scope.label(&self.hierarchy),
            task_count: self.scoped_tasks().len(),
            progress: compute_progress(&self.tasks),
            points: compute_points(&self.tasks),
            deadlines: compute_deadline_indicators(self.project.end_date, today, &self.tasks),
            budget: compute_budget_indicators(&self.tasks),
        }
    }

    pub async fn update_settings(&mut self, settings: UpdateProjectSettings) -> Result<&Project> {
        with_timeout(self.timeout, self.store.set_project_settings(settings)).await?;
        self.project = with_timeout(self.timeout, self.store.get_project()).await?;
        Ok(&self.project)
    }

    // --- scope selection ---

    pub async fn set_scope_level(&mut self, level: ScopeType) -> Result<()> {
        self.scope.scope_type = level;
        self.scope.normalize(&self.hierarchy);
        self.persist_scope().await?;
        self.emit_scope_changed();
        self.emit_tasks_changed();
        Ok(())
    }

    pub async fn select_area(&mut self, id: AreaId) -> Result<()> {
        if self.hierarchy.area(id).is_none() {
            return Err(Error::not_found("area", id));
        }
        self.scope = ScopeSelection::area(id);
        self.scope.normalize(&self.hierarchy);
        self.persist_scope().await?;
        self.emit_scope_changed();
        self.emit_tasks_changed();
        Ok(())
    }

    pub async fn select_sub_area(&mut self, id: SubAreaId) -> Result<()> {
        let Some(area_id) = self.hierarchy.area_of_sub_area(id) else {
            return Err(Error::not_found("sub-area", id));
        };
        self.scope = ScopeSelection {
            scope_type: ScopeType::SubArea,
            area_id: Some(area_id),
            sub_area_id: Some(id),
            corner_id: None,
        };
        self.persist_scope().await?;
        self.emit_scope_changed();
        self.emit_tasks_changed();
        Ok(())
    }

    pub async fn select_corner(&mut self, id: CornerId) -> Result<()> {
        let Some(corner) = self.hierarchy.corner(id) else {
            return Err(Error::not_found("corner", id));
        };
        let sub_area_id = corner.sub_area_id;
        self.scope = ScopeSelection {
            scope_type: ScopeType::Corner,
            area_id: self.hierarchy.area_of_sub_area(sub_area_id),
            sub_area_id: Some(sub_area_id),
            corner_id: Some(id),
        };
        self.persist_scope().await?;
        self.emit_scope_changed();
        self.emit_tasks_changed();
        Ok(())
    }

    async fn persist_scope(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.scope)?;
        with_timeout(self.timeout, self.store.kv_set(LAST_SCOPE_KEY, &raw)).await
    }

    // --- hierarchy ---

    pub async fn create_area(
        &mut self,
        name: &str,
        kind: &str,
        cover_path: Option<PathBuf>,
    ) -> Result<Area> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("area name must not be empty"));
        }
        let new_area = NewArea {
            name: name.to_string(),
            kind: kind.trim().to_string(),
            cover_path,
        };
        let area = with_timeout(self.timeout, self.store.add_area(new_area)).await?;
        self.hierarchy
            .insert_area(area.id, &area.name, &area.kind, area.cover_fname.clone());
        self.scope.normalize(&self.hierarchy);
        self.events.push(Event::HierarchyChanged);
        self.emit_scope_changed();
        Ok(area)
    }

    pub async fn rename_area(&mut self, id: AreaId, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("area name must not be empty"));
        }
        let update = AreaUpdate {
            name: Some(name.to_string()),
            ..AreaUpdate::default()
        };
        with_timeout(self.timeout, self.store.update_area(id, &update)).await?;
        self.hierarchy.rename_area(id, name);
        self.events.push(Event::HierarchyChanged);
        Ok(())
    }

    pub async fn delete_area(&mut self, id: AreaId) -> Result<()> {
        with_timeout(self.timeout, self.store.delete_area(id)).await?;
        self.hierarchy.remove_area(id);
        self.tasks.retain(|t| t.area_id != id);
        self.scope.narrow_to_valid(&self.hierarchy);
        self.persist_scope().await?;
        self.events.push(Event::HierarchyChanged);
        self.emit_scope_changed();
        self.emit_tasks_changed();
        Ok(())
    }

    pub async fn create_sub_area(
        &mut self,
        area_id: AreaId,
        name: &str,
        description: Option<String>,
    ) -> Result<SubArea> {
        if self.hierarchy.area(area_id).is_none() {
            return Err(Error::not_found("area", area_id));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("sub-area name must not be empty"));
        }
        let new_sub_area = NewSubArea {
            area_id,
            name: name.to_string(),
            description,
        };
        let sub_area = with_timeout(self.timeout, self.store.add_sub_area(new_sub_area)).await?;
        self.hierarchy.insert_sub_area(
            sub_area.id,
            sub_area.area_id,
            &sub_area.name,
            sub_area.description.clone(),
            sub_area.cover_fname.clone(),
        );
        self.events.push(Event::HierarchyChanged);
        Ok(sub_area)
    }

    pub async fn rename_sub_area(&mut self, id: SubAreaId, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("sub-area name must not be empty"));
        }
        let update = SubAreaUpdate {
            name: Some(name.to_string()),
            ..SubAreaUpdate::default()
        };
        with_timeout(self.timeout, self.store.update_sub_area(id, &update)).await?;
        self.hierarchy.rename_sub_area(id, name);
        self.events.push(Event::HierarchyChanged);
        Ok(())
    }

    pub async fn delete_sub_area(&mut self, id: SubAreaId) -> Result<()> {
        with_timeout(self.timeout, self.store.delete_sub_area(id)).await?;
        let report = self.hierarchy.remove_sub_area(id);
        self.tasks.retain(|t| !report.covers(t.scope));
        self.scope.narrow_to_valid(&self.hierarchy);
        self.persist_scope().await?;
        self.events.push(Event::HierarchyChanged);
        self.emit_scope_changed();
        self.emit_tasks_changed();
        Ok(())
    }

    pub async fn create_corner(
        &mut self,
        sub_area_id: SubAreaId,
        name: &str,
        description: Option<String>,
    ) -> Result<Corner> {
        if self.hierarchy.sub_area(sub_area_id).is_none() {
            return Err(Error::not_found("sub-area", sub_area_id));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("corner name must not be empty"));
        }
        let new_corner = NewCorner {
            sub_area_id,
            name: name.to_string(),
            description,
        };
        let corner = with_timeout(self.timeout, self.store.add_corner(new_corner)).await?;
        self.hierarchy.insert_corner(
            corner.id,
            corner.sub_area_id,
            &corner.name,
            corner.description.clone(),
            corner.cover_fname.clone(),
        );
        self.events.push(Event::HierarchyChanged);
        Ok(corner)
    }

    pub async fn rename_corner(&mut self, id: CornerId, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("corner name must not be empty"));
        }
        let update = CornerUpdate {
            name: Some(name.to_string()),
            ..CornerUpdate::default()
        };
        with_timeout(self.timeout, self.store.update_corner(id, &update)).await?;
        self.hierarchy.rename_corner(id, name);
        self.events.push(Event::HierarchyChanged);
        Ok(())
    }

    pub async fn delete_corner(&mut self, id: CornerId) -> Result<()> {
        with_timeout(self.timeout, self.store.delete_corner(id)).await?;
        let report = self.hierarchy.remove_corner(id);
        self.tasks.retain(|t| !report.covers(t.scope));
        self.scope.narrow_to_valid(&self.hierarchy);
        self.persist_scope().await?;
        self.events.push(Event::HierarchyChanged);
        self.emit_scope_changed();
        self.emit_tasks_changed();
        Ok(())
    }

    // --- tasks ---

    pub async fn create_task(&mut self, form: &TaskForm) -> Result<Task> {
        let Some(filter) = self.scope.filter() else {
            return Err(Error::validation("choose a scope before adding tasks"));
        };
        let Some(area_id) = self.scope.resolve_area_id(&self.hierarchy) else {
            return Err(Error::validation("the selected scope has no owning area"));
        };
        let draft = build_task_draft(form, filter, area_id)?;
        let task = with_timeout(self.timeout, self.store.add_task(&draft)).await?;
        self.tasks.push(task.clone());
        self.emit_tasks_changed();
        Ok(task)
    }

    /// Move a task one step along the board. `Ok(None)` at either edge; a
    /// forward move into done awards the completion bonus at most once per
    /// task, tracked by the per-user ledger.
    pub async fn move_task(
        &mut self,
        id: TaskId,
        direction: MoveDirection,
    ) -> Result<Option<Task>> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(Error::not_found("task", id))?;
        let Some(next) = task.next_status(direction) else {
            return Ok(None);
        };
        task.check_transition(next)?;

        let updated = with_timeout(self.timeout, self.store.update_task_status(id, next)).await?;
        // Local state tracks storage even when the award below fails; the
        // ledger stays unmarked, so a later completion re-attempts it.
        self.replace_task(updated.clone());
        self.emit_tasks_changed();
        if updated.status == crate::domain::normalize::Status::Done {
            self.award_completion(&updated).await?;
        }
        Ok(Some(updated))
    }

    pub async fn edit_task(&mut self, id: TaskId, form: &TaskPatchForm) -> Result<Task> {
        let current = self
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(Error::not_found("task", id))?;
        let patch = build_task_patch(form)?;
        if patch.is_empty() {
            return Ok(current);
        }
        if let Some(next) = patch.status {
            if next != current.status {
                current.check_transition(next)?;
            }
        }
        let updated = with_timeout(self.timeout, self.store.update_task(id, &patch)).await?;
        self.replace_task(updated.clone());
        self.emit_tasks_changed();
        if let Some(next) = patch.status {
            if next == crate::domain::normalize::Status::Done && current.status != next {
                self.award_completion(&updated).await?;
            }
        }
        Ok(updated)
    }

    pub async fn attach_photo(
        &mut self,
        id: TaskId,
        slot: PhotoSlot,
        source: PathBuf,
    ) -> Result<Task> {
        let updated =
            with_timeout(self.timeout, self.store.attach_task_photo(id, slot, &source)).await?;
        self.replace_task(updated.clone());
        self.emit_tasks_changed();
        Ok(updated)
    }

    pub async fn delete_task(&mut self, id: TaskId) -> Result<()> {
        with_timeout(self.timeout, self.store.delete_task(id)).await?;
        self.tasks.retain(|t| t.id != id);
        self.emit_tasks_changed();
        Ok(())
    }

    /// Lifetime points first, ledger mark second. A failure in the profile
    /// mutation leaves the ledger unmarked so a retry can re-attempt the
    /// award; the reverse order could lose points permanently.
    async fn award_completion(&mut self, task: &Task) -> Result<()> {
        let user_id = self.identity.current_user_id().to_string();
        let key = PointsLedger::storage_key(&user_id, &self.project.id);
        let raw = with_timeout(self.timeout, self.store.kv_get(&key)).await?;
        let mut ledger = PointsLedger::from_stored(&user_id, &self.project.id, raw.as_deref());
        if ledger.has_been_scored(task.id) {
            return Ok(());
        }
        let points = i64::from(task_points(task));
        with_timeout(
            self.timeout,
            self.profile.add_lifetime_points(&user_id, points),
        )
        .await?;
        ledger.mark_scored(task.id);
        let json = ledger.to_json()?;
        with_timeout(self.timeout, self.store.kv_set(&ledger.key(), &json)).await?;
        tracing::info!(task_id = task.id, points, "completion bonus awarded");
        Ok(())
    }

    fn replace_task(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }

    fn emit_scope_changed(&mut self) {
        self.events.push(Event::ScopeChanged {
            label: self.scope.label(&self.hierarchy),
            filter: self.scope.filter(),
        });
    }

    fn emit_tasks_changed(&mut self) {
        let dashboard = self.dashboard();
        self.events.push(Event::TasksChanged { dashboard });
    }
}
