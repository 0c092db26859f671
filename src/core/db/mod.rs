mod area;
mod corner;
mod kv;
mod project;
mod state;
mod sub_area;
mod task;

use std::path::Path;
use std::sync::Arc;

use sqlx::{Connection, Row, sqlite::SqliteRow};
use state::ProjectState;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

pub use area::{AreaRepository, AreaUpdate, NewArea};
pub use corner::{CornerRepository, CornerUpdate, NewCorner};
pub use kv::KvStore;
pub use project::{Project, ProjectRepository, UpdateProjectSettings};
pub use sub_area::{NewSubArea, SubAreaRepository, SubAreaUpdate};
pub use task::{PhotoSlot, TaskRepository};

use crate::domain::hierarchy::{Area, Corner, SubArea};
use crate::domain::normalize::{DATE_FORMAT, Status, TaskPatch, Weight};
use crate::domain::scope::{AreaId, CornerId, ScopeRef, ScopeType, SubAreaId};
use crate::domain::task::{NewTask, Task};
use crate::error::{Error, Result};

/// Handle to one open project file. Cheap to clone; all clones share the
/// same working directory and connection pool.
#[derive(Debug, Clone)]
pub struct ProjectDb {
    state: Arc<ProjectState>,
}

impl ProjectDb {
    pub async fn new<P: AsRef<Path>>(project_file: P) -> Result<Self> {
        let name_hint = project_file
            .as_ref()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("renovation")
            .to_string();
        let db = Self {
            state: Arc::new(ProjectState::new(project_file).await?),
        };
        db.seed_metadata(&name_hint).await?;
        Ok(db)
    }

    /// Explicitly pack the archive back to disk. Required before dropping in
    /// an async context (e.g. tests), where save-on-drop cannot block.
    pub async fn save_project(&self) -> Result<()> {
        self.state.save_project().await
    }

    pub fn photo_path(&self, fname: &str) -> std::path::PathBuf {
        self.state.photo_path(fname)
    }

    /// First open of a fresh archive: give the project an identity and
    /// sensible defaults without clobbering an existing one.
    async fn seed_metadata(&self, name_hint: &str) -> Result<()> {
        let mut conn = self.state.conn().await?;
        let created_at = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|err| Error::External(anyhow::anyhow!("failed to format timestamp: {err}")))?;
        let defaults = [
            ("id", Uuid::new_v4().to_string()),
            ("name", name_hint.to_string()),
            ("home_type", "apartment".to_string()),
            ("mode", "macro".to_string()),
            ("created_at", created_at),
        ];
        for (key, value) in defaults {
            sqlx::query("INSERT OR IGNORE INTO project_metadata (key, value) VALUES ($1, $2)")
                .bind(key)
                .bind(value)
                .execute(&mut **conn)
                .await?;
        }
        Ok(())
    }

    async fn meta_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query("SELECT value FROM project_metadata WHERE key = $1")
            .bind(key)
            .fetch_optional(&mut **conn)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    async fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            "INSERT INTO project_metadata (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut **conn)
        .await?;
        Ok(())
    }
}

fn date_to_db(date: Option<Date>) -> Result<Option<String>> {
    date.map(|d| {
        d.format(DATE_FORMAT)
            .map_err(|err| Error::External(anyhow::anyhow!("failed to format date: {err}")))
    })
    .transpose()
}

fn date_from_db(raw: Option<String>) -> Result<Option<Date>> {
    raw.map(|s| {
        Date::parse(&s, DATE_FORMAT)
            .map_err(|err| Error::External(anyhow::anyhow!("unreadable stored date '{s}': {err}")))
    })
    .transpose()
}

fn area_from_row(row: &SqliteRow) -> Result<Area> {
    Ok(Area {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: row.try_get("kind")?,
        cover_fname: row.try_get("cover_fname")?,
    })
}

fn sub_area_from_row(row: &SqliteRow) -> Result<SubArea> {
    Ok(SubArea {
        id: row.try_get("id")?,
        area_id: row.try_get("area_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        cover_fname: row.try_get("cover_fname")?,
    })
}

fn corner_from_row(row: &SqliteRow) -> Result<Corner> {
    Ok(Corner {
        id: row.try_get("id")?,
        sub_area_id: row.try_get("sub_area_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        cover_fname: row.try_get("cover_fname")?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    let status: String = row.try_get("status")?;
    let weight: String = row.try_get("weight")?;
    let scope_type: String = row.try_get("scope_type")?;
    Ok(Task {
        id: row.try_get("id")?,
        area_id: row.try_get("area_id")?,
        scope: ScopeRef {
            scope_type: ScopeType::from_db(&scope_type)?,
            scope_id: row.try_get("scope_id")?,
        },
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        task_type: row.try_get("task_type")?,
        status: Status::from_canonical(&status)?,
        weight: Weight::from_canonical(&weight)?,
        due_date: date_from_db(row.try_get("due_date")?)?,
        cost_expected: row.try_get("cost_expected")?,
        cost_real: row.try_get("cost_real")?,
        has_photo_before: row.try_get("has_photo_before")?,
        has_photo_after: row.try_get("has_photo_after")?,
        photo_before_fname: row.try_get("photo_before_fname")?,
        photo_after_fname: row.try_get("photo_after_fname")?,
    })
}

const TASK_COLUMNS: &str = "id, area_id, scope_type, scope_id, title, description, task_type, \
     status, weight, due_date, cost_expected, cost_real, has_photo_before, has_photo_after, \
     photo_before_fname, photo_after_fname";

fn collect_task_photos(rows: &[SqliteRow], out: &mut Vec<String>) -> Result<()> {
    for row in rows {
        for column in ["photo_before_fname", "photo_after_fname"] {
            if let Some(fname) = row.try_get::<Option<String>, _>(column)? {
                out.push(fname);
            }
        }
    }
    Ok(())
}

impl ProjectRepository for ProjectDb {
    async fn get_project(&self) -> Result<Project> {
        let mut conn = self.state.conn().await?;
        let rows = sqlx::query("SELECT key, value FROM project_metadata")
            .fetch_all(&mut **conn)
            .await?;
        drop(conn);

        let mut id = None;
        let mut name = None;
        let mut home_type = None;
        let mut mode = None;
        let mut start_date = None;
        let mut end_date = None;
        let mut budget_expected = 0.0;
        let mut budget_real = 0.0;
        let mut created_at = None;
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            match key.as_str() {
                "id" => id = Some(value),
                "name" => name = Some(value),
                "home_type" => home_type = Some(value),
                "mode" => mode = Some(value),
                "start_date" => start_date = date_from_db(Some(value))?,
                "end_date" => end_date = date_from_db(Some(value))?,
                "budget_expected" => {
                    budget_expected = value.parse().map_err(|_| {
                        Error::External(anyhow::anyhow!("unreadable budget_expected '{value}'"))
                    })?;
                }
                "budget_real" => {
                    budget_real = value.parse().map_err(|_| {
                        Error::External(anyhow::anyhow!("unreadable budget_real '{value}'"))
                    })?;
                }
                "created_at" => {
                    created_at = Some(
                        OffsetDateTime::parse(
                            &value,
                            &time::format_description::well_known::Rfc3339,
                        )
                        .map_err(|err| {
                            Error::External(anyhow::anyhow!("unreadable created_at: {err}"))
                        })?,
                    );
                }
                _ => {}
            }
        }
        let missing =
            |field: &str| Error::External(anyhow::anyhow!("project metadata missing '{field}'"));
        Ok(Project {
            id: id.ok_or_else(|| missing("id"))?,
            name: name.ok_or_else(|| missing("name"))?,
            home_type: home_type.ok_or_else(|| missing("home_type"))?,
            mode: mode.ok_or_else(|| missing("mode"))?,
            start_date,
            end_date,
            budget_expected,
            budget_real,
            created_at: created_at.ok_or_else(|| missing("created_at"))?,
        })
    }

    async fn set_project_settings(&self, settings: UpdateProjectSettings) -> Result<()> {
        let mut items: Vec<(&str, String)> = Vec::new();
        if let Some(name) = settings.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(Error::validation("project name must not be empty"));
            }
            items.push(("name", name));
        }
        if let Some(home_type) = settings.home_type {
            items.push(("home_type", home_type));
        }
        if let Some(mode) = settings.mode {
            items.push(("mode", mode));
        }
        if let Some(start) = settings.start_date {
            items.push(("start_date", date_to_db(start)?.unwrap_or_default()));
        }
        if let Some(end) = settings.end_date {
            items.push(("end_date", date_to_db(end)?.unwrap_or_default()));
        }
        if let Some(expected) = settings.budget_expected {
            items.push(("budget_expected", expected.to_string()));
        }
        if let Some(real) = settings.budget_real {
            items.push(("budget_real", real.to_string()));
        }
        for (key, value) in items {
            if value.is_empty() {
                let mut conn = self.state.conn().await?;
                sqlx::query("DELETE FROM project_metadata WHERE key = $1")
                    .bind(key)
                    .execute(&mut **conn)
                    .await?;
            } else {
                self.meta_set(key, &value).await?;
            }
        }
        Ok(())
    }
}

impl AreaRepository for ProjectDb {
    async fn get_areas(&self) -> Result<Vec<Area>> {
        let mut conn = self.state.conn().await?;
        sqlx::query("SELECT id, name, kind, cover_fname FROM area ORDER BY id ASC")
            .fetch_all(&mut **conn)
            .await?
            .iter()
            .map(area_from_row)
            .collect()
    }

    async fn get_area_by_id(&self, id: AreaId) -> Result<Option<Area>> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query("SELECT id, name, kind, cover_fname FROM area WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **conn)
            .await?;
        row.as_ref().map(area_from_row).transpose()
    }

    async fn add_area(&self, area: NewArea) -> Result<Area> {
        let cover_fname = match &area.cover_path {
            Some(path) => Some(self.state.store_photo(path).await?),
            None => None,
        };
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            "INSERT INTO area (name, kind, cover_fname) VALUES ($1, $2, $3)
             RETURNING id, name, kind, cover_fname",
        )
        .bind(&area.name)
        .bind(&area.kind)
        .bind(&cover_fname)
        .fetch_one(&mut **conn)
        .await?;
        area_from_row(&row)
    }

    async fn update_area(&self, id: AreaId, update: &AreaUpdate) -> Result<Area> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            "UPDATE area SET
                name = COALESCE($2, name),
                kind = COALESCE($3, kind)
             WHERE id = $1
             RETURNING id, name, kind, cover_fname",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.kind)
        .fetch_optional(&mut **conn)
        .await?;
        match row {
            Some(row) => area_from_row(&row),
            None => Err(Error::not_found("area", id)),
        }
    }

    async fn delete_area(&self, id: AreaId) -> Result<()> {
        // Every stored file owned by the cascade, gathered up front so the
        // working dir can be cleaned after the rows are gone.
        let mut orphaned: Vec<String> = Vec::new();
        {
            let mut conn = self.state.conn().await?;
            let row = sqlx::query("SELECT cover_fname FROM area WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **conn)
                .await?;
            let Some(row) = row else {
                return Err(Error::not_found("area", id));
            };
            if let Some(cover) = row.try_get::<Option<String>, _>("cover_fname")? {
                orphaned.push(cover);
            }
            let covers = sqlx::query(
                "SELECT cover_fname FROM sub_area
                     WHERE area_id = $1 AND cover_fname IS NOT NULL
                 UNION ALL
                 SELECT cover_fname FROM corner
                     WHERE sub_area_id IN (SELECT id FROM sub_area WHERE area_id = $1)
                       AND cover_fname IS NOT NULL",
            )
            .bind(id)
            .fetch_all(&mut **conn)
            .await?;
            for row in &covers {
                orphaned.push(row.try_get("cover_fname")?);
            }
            let photos = sqlx::query(
                "SELECT photo_before_fname, photo_after_fname FROM task WHERE area_id = $1",
            )
            .bind(id)
            .fetch_all(&mut **conn)
            .await?;
            collect_task_photos(&photos, &mut orphaned)?;

            let mut tx = conn.begin().await?;
            sqlx::query("DELETE FROM task WHERE area_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "DELETE FROM corner WHERE sub_area_id IN
                     (SELECT id FROM sub_area WHERE area_id = $1)",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM sub_area WHERE area_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM area WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        for fname in orphaned {
            self.state.delete_photo(&fname).await?;
        }
        Ok(())
    }
}

impl SubAreaRepository for ProjectDb {
    async fn list_sub_areas(&self, area_id: AreaId) -> Result<Vec<SubArea>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            "SELECT id, area_id, name, description, cover_fname FROM sub_area
             WHERE area_id = $1 ORDER BY id ASC",
        )
        .bind(area_id)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(sub_area_from_row)
        .collect()
    }

    async fn get_sub_area_by_id(&self, id: SubAreaId) -> Result<Option<SubArea>> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            "SELECT id, area_id, name, description, cover_fname FROM sub_area WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut **conn)
        .await?;
        row.as_ref().map(sub_area_from_row).transpose()
    }

    async fn add_sub_area(&self, sub_area: NewSubArea) -> Result<SubArea> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            "INSERT INTO sub_area (area_id, name, description) VALUES ($1, $2, $3)
             RETURNING id, area_id, name, description, cover_fname",
        )
        .bind(sub_area.area_id)
        .bind(&sub_area.name)
        .bind(&sub_area.description)
        .fetch_one(&mut **conn)
        .await?;
        sub_area_from_row(&row)
    }

    async fn update_sub_area(&self, id: SubAreaId, update: &SubAreaUpdate) -> Result<SubArea> {
        let mut conn = self.state.conn().await?;
        // description uses a sentinel flag because "set to NULL" and "leave
        // alone" are different patches.
        let row = sqlx::query(
            "UPDATE sub_area SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END
             WHERE id = $1
             RETURNING id, area_id, name, description, cover_fname",
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.description.is_some())
        .bind(update.description.clone().flatten())
        .fetch_optional(&mut **conn)
        .await?;
        match row {
            Some(row) => sub_area_from_row(&row),
            None => Err(Error::not_found("sub-area", id)),
        }
    }

    async fn delete_sub_area(&self, id: SubAreaId) -> Result<()> {
        let mut orphaned: Vec<String> = Vec::new();
        {
            let mut conn = self.state.conn().await?;
            let row = sqlx::query("SELECT cover_fname FROM sub_area WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **conn)
                .await?;
            let Some(row) = row else {
                return Err(Error::not_found("sub-area", id));
            };
            if let Some(cover) = row.try_get::<Option<String>, _>("cover_fname")? {
                orphaned.push(cover);
            }
            let covers = sqlx::query(
                "SELECT cover_fname FROM corner
                 WHERE sub_area_id = $1 AND cover_fname IS NOT NULL",
            )
            .bind(id)
            .fetch_all(&mut **conn)
            .await?;
            for row in &covers {
                orphaned.push(row.try_get("cover_fname")?);
            }
            let photos = sqlx::query(
                "SELECT photo_before_fname, photo_after_fname FROM task
                 WHERE (scope_type = 'sub_area' AND scope_id = $1)
                    OR (scope_type = 'corner' AND scope_id IN
                        (SELECT id FROM corner WHERE sub_area_id = $1))",
            )
            .bind(id)
            .fetch_all(&mut **conn)
            .await?;
            collect_task_photos(&photos, &mut orphaned)?;

            let mut tx = conn.begin().await?;
            sqlx::query(
                "DELETE FROM task WHERE (scope_type = 'sub_area' AND scope_id = $1)
                    OR (scope_type = 'corner' AND scope_id IN
                        (SELECT id FROM corner WHERE sub_area_id = $1))",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM corner WHERE sub_area_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM sub_area WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        for fname in orphaned {
            self.state.delete_photo(&fname).await?;
        }
        Ok(())
    }
}

impl CornerRepository for ProjectDb {
    async fn list_corners(&self, sub_area_id: SubAreaId) -> Result<Vec<Corner>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            "SELECT id, sub_area_id, name, description, cover_fname FROM corner
             WHERE sub_area_id = $1 ORDER BY id ASC",
        )
        .bind(sub_area_id)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(corner_from_row)
        .collect()
    }

    async fn get_corner_by_id(&self, id: CornerId) -> Result<Option<Corner>> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            "SELECT id, sub_area_id, name, description, cover_fname FROM corner WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut **conn)
        .await?;
        row.as_ref().map(corner_from_row).transpose()
    }

    async fn add_corner(&self, corner: NewCorner) -> Result<Corner> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            "INSERT INTO corner (sub_area_id, name, description) VALUES ($1, $2, $3)
             RETURNING id, sub_area_id, name, description, cover_fname",
        )
        .bind(corner.sub_area_id)
        .bind(&corner.name)
        .bind(&corner.description)
        .fetch_one(&mut **conn)
        .await?;
        corner_from_row(&row)
    }

    async fn update_corner(&self, id: CornerId, update: &CornerUpdate) -> Result<Corner> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            "UPDATE corner SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END
             WHERE id = $1
             RETURNING id, sub_area_id, name, description, cover_fname",
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.description.is_some())
        .bind(update.description.clone().flatten())
        .fetch_optional(&mut **conn)
        .await?;
        match row {
            Some(row) => corner_from_row(&row),
            None => Err(Error::not_found("corner", id)),
        }
    }

    async fn delete_corner(&self, id: CornerId) -> Result<()> {
        let mut orphaned: Vec<String> = Vec::new();
        {
            let mut conn = self.state.conn().await?;
            let row = sqlx::query("SELECT cover_fname FROM corner WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **conn)
                .await?;
            let Some(row) = row else {
                return Err(Error::not_found("corner", id));
            };
            if let Some(cover) = row.try_get::<Option<String>, _>("cover_fname")? {
                orphaned.push(cover);
            }
            let photos = sqlx::query(
                "SELECT photo_before_fname, photo_after_fname FROM task
                 WHERE scope_type = 'corner' AND scope_id = $1",
            )
            .bind(id)
            .fetch_all(&mut **conn)
            .await?;
            collect_task_photos(&photos, &mut orphaned)?;

            let mut tx = conn.begin().await?;
            sqlx::query("DELETE FROM task WHERE scope_type = 'corner' AND scope_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM corner WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        for fname in orphaned {
            self.state.delete_photo(&fname).await?;
        }
        Ok(())
    }
}

impl TaskRepository for ProjectDb {
    async fn get_tasks(&self) -> Result<Vec<Task>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM task ORDER BY id ASC"))
            .fetch_all(&mut **conn)
            .await?
            .iter()
            .map(task_from_row)
            .collect()
    }

    async fn get_tasks_by_scope(&self, scope: ScopeRef) -> Result<Vec<Task>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM task
             WHERE scope_type = $1 AND scope_id = $2 ORDER BY id ASC"
        ))
        .bind(scope.scope_type.as_str())
        .bind(scope.scope_id)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(task_from_row)
        .collect()
    }

    async fn get_task_by_id(&self, id: i64) -> Result<Option<Task>> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM task WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut **conn)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn add_task(&self, task: &NewTask) -> Result<Task> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(&format!(
            "INSERT INTO task
                (area_id, scope_type, scope_id, title, description, task_type,
                 status, weight, due_date, cost_expected, cost_real)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(task.area_id)
        .bind(task.scope.scope_type.as_str())
        .bind(task.scope.scope_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.task_type)
        .bind(task.status.as_str())
        .bind(task.weight.as_str())
        .bind(date_to_db(task.due_date)?)
        .bind(task.cost_expected)
        .bind(task.cost_real)
        .fetch_one(&mut **conn)
        .await?;
        task_from_row(&row)
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(&format!(
            "UPDATE task SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                task_type = COALESCE($4, task_type),
                status = COALESCE($5, status),
                weight = COALESCE($6, weight),
                due_date = CASE WHEN $7 THEN $8 ELSE due_date END,
                cost_expected = COALESCE($9, cost_expected),
                cost_real = COALESCE($10, cost_real)
             WHERE id = $1
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.task_type)
        .bind(patch.status.map(Status::as_str))
        .bind(patch.weight.map(Weight::as_str))
        .bind(patch.due_date.is_some())
        .bind(date_to_db(patch.due_date.flatten())?)
        .bind(patch.cost_expected)
        .bind(patch.cost_real)
        .fetch_optional(&mut **conn)
        .await?;
        match row {
            Some(row) => task_from_row(&row),
            None => Err(Error::not_found("task", id)),
        }
    }

    async fn update_task_status(&self, id: i64, status: Status) -> Result<Task> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(&format!(
            "UPDATE task SET status = $2 WHERE id = $1 RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&mut **conn)
        .await?;
        match row {
            Some(row) => task_from_row(&row),
            None => Err(Error::not_found("task", id)),
        }
    }

    async fn attach_task_photo(&self, id: i64, slot: PhotoSlot, source: &Path) -> Result<Task> {
        let (fname_col, flag_col) = match slot {
            PhotoSlot::Before => ("photo_before_fname", "has_photo_before"),
            PhotoSlot::After => ("photo_after_fname", "has_photo_after"),
        };
        let previous: Option<String> = {
            let mut conn = self.state.conn().await?;
            let row = sqlx::query(&format!("SELECT {fname_col} AS fname FROM task WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut **conn)
                .await?;
            match row {
                Some(row) => row.try_get("fname")?,
                None => return Err(Error::not_found("task", id)),
            }
        };

        let fname = self.state.store_photo(source).await?;
        let task = {
            let mut conn = self.state.conn().await?;
            let row = sqlx::query(&format!(
                "UPDATE task SET {fname_col} = $2, {flag_col} = 1
                 WHERE id = $1 RETURNING {TASK_COLUMNS}"
            ))
            .bind(id)
            .bind(&fname)
            .fetch_optional(&mut **conn)
            .await?;
            match row {
                Some(row) => task_from_row(&row)?,
                None => return Err(Error::not_found("task", id)),
            }
        };
        if let Some(old) = previous {
            self.state.delete_photo(&old).await?;
        }
        Ok(task)
    }

    async fn delete_task(&self, id: i64) -> Result<()> {
        let mut orphaned: Vec<String> = Vec::new();
        {
            let mut conn = self.state.conn().await?;
            let row = sqlx::query(
                "SELECT photo_before_fname, photo_after_fname FROM task WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut **conn)
            .await?;
            let Some(row) = row else {
                return Err(Error::not_found("task", id));
            };
            collect_task_photos(std::slice::from_ref(&row), &mut orphaned)?;

            sqlx::query("DELETE FROM task WHERE id = $1")
                .bind(id)
                .execute(&mut **conn)
                .await?;
        }
        for fname in orphaned {
            self.state.delete_photo(&fname).await?;
        }
        Ok(())
    }
}

impl KvStore for ProjectDb {
    async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query("SELECT value FROM kv WHERE key = $1")
            .bind(key)
            .fetch_optional(&mut **conn)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    async fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut **conn)
        .await?;
        Ok(())
    }
}
