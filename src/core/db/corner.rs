//! Corner repository: the finest-grained location, owns no children.

use std::future::Future;

use crate::domain::hierarchy::Corner;
use crate::domain::scope::{CornerId, SubAreaId};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NewCorner {
    pub sub_area_id: SubAreaId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CornerUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

pub trait CornerRepository {
    fn list_corners(&self, sub_area_id: SubAreaId) -> impl Future<Output = Result<Vec<Corner>>>;
    fn get_corner_by_id(&self, id: CornerId) -> impl Future<Output = Result<Option<Corner>>>;
    fn add_corner(&self, corner: NewCorner) -> impl Future<Output = Result<Corner>>;
    fn update_corner(
        &self,
        id: CornerId,
        update: &CornerUpdate,
    ) -> impl Future<Output = Result<Corner>>;
    /// Removes the corner and every task scoped to it.
    fn delete_corner(&self, id: CornerId) -> impl Future<Output = Result<()>>;
}
