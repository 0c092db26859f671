//! Sub-area repository. Listings are always scoped by the owning area.

use std::future::Future;

use crate::domain::hierarchy::SubArea;
use crate::domain::scope::{AreaId, SubAreaId};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NewSubArea {
    pub area_id: AreaId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubAreaUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

pub trait SubAreaRepository {
    fn list_sub_areas(&self, area_id: AreaId) -> impl Future<Output = Result<Vec<SubArea>>>;
    fn get_sub_area_by_id(&self, id: SubAreaId)
    -> impl Future<Output = Result<Option<SubArea>>>;
    fn add_sub_area(&self, sub_area: NewSubArea) -> impl Future<Output = Result<SubArea>>;
    fn update_sub_area(
        &self,
        id: SubAreaId,
        update: &SubAreaUpdate,
    ) -> impl Future<Output = Result<SubArea>>;
    /// Removes the sub-area, its corners, and every task scoped to either.
    fn delete_sub_area(&self, id: SubAreaId) -> impl Future<Output = Result<()>>;
}
