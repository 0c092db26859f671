//! Area (room) repository.

use std::future::Future;
use std::path::PathBuf;

use crate::domain::hierarchy::Area;
use crate::domain::scope::AreaId;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NewArea {
    pub name: String,
    pub kind: String,
    /// Optional cover photo, copied into the project file on create.
    pub cover_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct AreaUpdate {
    pub name: Option<String>,
    pub kind: Option<String>,
}

pub trait AreaRepository {
    fn get_areas(&self) -> impl Future<Output = Result<Vec<Area>>>;
    fn get_area_by_id(&self, id: AreaId) -> impl Future<Output = Result<Option<Area>>>;
    fn add_area(&self, area: NewArea) -> impl Future<Output = Result<Area>>;
    /// Updates never change topology; there is no parent to move.
    fn update_area(&self, id: AreaId, update: &AreaUpdate) -> impl Future<Output = Result<Area>>;
    /// Removes the area, its sub-areas, their corners, and every task whose
    /// denormalized `area_id` matches, in one transaction.
    fn delete_area(&self, id: AreaId) -> impl Future<Output = Result<()>>;
}
