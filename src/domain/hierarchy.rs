//! In-memory mirror of one project's space hierarchy.
//!
//! Entities live in flat maps with a child index per parent, so cascading a
//! delete is a property of this structure rather than of call-site
//! filtering. The view converges to whatever the store reports on the next
//! load; between loads it is kept in lockstep by the controller.

use std::collections::HashMap;

use crate::domain::scope::{AreaId, CornerId, ScopeRef, ScopeType, SubAreaId};

#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    pub kind: String,
    pub cover_fname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubArea {
    pub id: SubAreaId,
    pub area_id: AreaId,
    pub name: String,
    pub description: Option<String>,
    pub cover_fname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Corner {
    pub id: CornerId,
    pub sub_area_id: SubAreaId,
    pub name: String,
    pub description: Option<String>,
    pub cover_fname: Option<String>,
}

/// Everything removed by one cascading delete, so callers can drop tasks
/// whose scope node died.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeReport {
    pub areas: Vec<AreaId>,
    pub sub_areas: Vec<SubAreaId>,
    pub corners: Vec<CornerId>,
}

impl CascadeReport {
    /// Whether a task scope was removed by this cascade.
    pub fn covers(&self, scope: ScopeRef) -> bool {
        match scope.scope_type {
            ScopeType::Area => self.areas.contains(&scope.scope_id),
            ScopeType::SubArea => self.sub_areas.contains(&scope.scope_id),
            ScopeType::Corner => self.corners.contains(&scope.scope_id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyView {
    areas: Vec<Area>,
    sub_areas: HashMap<SubAreaId, SubArea>,
    corners: HashMap<CornerId, Corner>,
    sub_areas_by_area: HashMap<AreaId, Vec<SubAreaId>>,
    corners_by_sub_area: HashMap<SubAreaId, Vec<CornerId>>,
}

impl HierarchyView {
    pub fn rebuild(areas: Vec<Area>, sub_areas: Vec<SubArea>, corners: Vec<Corner>) -> Self {
        let mut view = HierarchyView::default();
        for area in areas {
            view.insert_area(area.id, &area.name, &area.kind, area.cover_fname);
        }
        for sa in sub_areas {
            view.insert_sub_area(sa.id, sa.area_id, &sa.name, sa.description, sa.cover_fname);
        }
        for corner in corners {
            view.insert_corner(
                corner.id,
                corner.sub_area_id,
                &corner.name,
                corner.description,
                corner.cover_fname,
            );
        }
        view
    }

    pub fn insert_area(
        &mut self,
        id: AreaId,
        name: &str,
        kind: &str,
        cover_fname: Option<String>,
    ) {
        self.areas.push(Area {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            cover_fname,
        });
        self.sub_areas_by_area.entry(id).or_default();
    }

    pub fn insert_sub_area(
        &mut self,
        id: SubAreaId,
        area_id: AreaId,
        name: &str,
        description: Option<String>,
        cover_fname: Option<String>,
    ) {
        self.sub_areas.insert(
            id,
            SubArea {
                id,
                area_id,
                name: name.to_string(),
                description,
                cover_fname,
            },
        );
        self.sub_areas_by_area.entry(area_id).or_default().push(id);
        self.corners_by_sub_area.entry(id).or_default();
    }

    pub fn insert_corner(
        &mut self,
        id: CornerId,
        sub_area_id: SubAreaId,
        name: &str,
        description: Option<String>,
        cover_fname: Option<String>,
    ) {
        self.corners.insert(
            id,
            Corner {
                id,
                sub_area_id,
                name: name.to_string(),
                description,
                cover_fname,
            },
        );
        self.corners_by_sub_area
            .entry(sub_area_id)
            .or_default()
            .push(id);
    }

    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.iter().find(|a| a.id == id)
    }

    pub fn sub_area(&self, id: SubAreaId) -> Option<&SubArea> {
        self.sub_areas.get(&id)
    }

    pub fn corner(&self, id: CornerId) -> Option<&Corner> {
        self.corners.get(&id)
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Children of one area, in insertion order. Listings are always scoped
    /// by direct parent, never global.
    pub fn sub_areas_of(&self, area_id: AreaId) -> Vec<&SubArea> {
        self.sub_areas_by_area
            .get(&area_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.sub_areas.get(id))
            .collect()
    }

    pub fn corners_of(&self, sub_area_id: SubAreaId) -> Vec<&Corner> {
        self.corners_by_sub_area
            .get(&sub_area_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.corners.get(id))
            .collect()
    }

    pub fn first_area_id(&self) -> Option<AreaId> {
        self.areas.first().map(|a| a.id)
    }

    pub fn first_sub_area_id(&self, area_id: AreaId) -> Option<SubAreaId> {
        self.sub_areas_by_area
            .get(&area_id)
            .and_then(|ids| ids.first().copied())
    }

    pub fn first_corner_id(&self, sub_area_id: SubAreaId) -> Option<CornerId> {
        self.corners_by_sub_area
            .get(&sub_area_id)
            .and_then(|ids| ids.first().copied())
    }

    pub fn area_of_sub_area(&self, id: SubAreaId) -> Option<AreaId> {
        self.sub_areas.get(&id).map(|sa| sa.area_id)
    }

    pub fn area_of_corner(&self, id: CornerId) -> Option<AreaId> {
        self.corners
            .get(&id)
            .and_then(|c| self.area_of_sub_area(c.sub_area_id))
    }

    /// Whether the scope target still exists.
    pub fn contains(&self, scope: ScopeRef) -> bool {
        match scope.scope_type {
            ScopeType::Area => self.area(scope.scope_id).is_some(),
            ScopeType::SubArea => self.sub_areas.contains_key(&scope.scope_id),
            ScopeType::Corner => self.corners.contains_key(&scope.scope_id),
        }
    }

    /// The area transitively owning a scope node.
    pub fn owning_area(&self, scope: ScopeRef) -> Option<AreaId> {
        match scope.scope_type {
            ScopeType::Area => self.area(scope.scope_id).map(|a| a.id),
            ScopeType::SubArea => self.area_of_sub_area(scope.scope_id),
            ScopeType::Corner => self.area_of_corner(scope.scope_id),
        }
    }

    /// Renames never change parentage; only create/delete touch topology.
    pub fn rename_area(&mut self, id: AreaId, name: &str) -> bool {
        match self.areas.iter_mut().find(|a| a.id == id) {
            Some(area) => {
                area.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn rename_sub_area(&mut self, id: SubAreaId, name: &str) -> bool {
        match self.sub_areas.get_mut(&id) {
            Some(sa) => {
                sa.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn rename_corner(&mut self, id: CornerId, name: &str) -> bool {
        match self.corners.get_mut(&id) {
            Some(corner) => {
                corner.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove_area(&mut self, id: AreaId) -> CascadeReport {
        let mut report = CascadeReport::default();
        if self.area(id).is_none() {
            return report;
        }
        report.areas.push(id);
        let sub_ids = self.sub_areas_by_area.remove(&id).unwrap_or_default();
        for sub_id in sub_ids {
            self.remove_sub_area_into(sub_id, &mut report);
        }
        self.areas.retain(|a| a.id != id);
        report
    }

    pub fn remove_sub_area(&mut self, id: SubAreaId) -> CascadeReport {
        let mut report = CascadeReport::default();
        if let Some(sa) = self.sub_areas.get(&id) {
            let area_id = sa.area_id;
            if let Some(siblings) = self.sub_areas_by_area.get_mut(&area_id) {
                siblings.retain(|sid| *sid != id);
            }
            self.remove_sub_area_into(id, &mut report);
        }
        report
    }

    pub fn remove_corner(&mut self, id: CornerId) -> CascadeReport {
        let mut report = CascadeReport::default();
        if let Some(corner) = self.corners.remove(&id) {
            if let Some(siblings) = self.corners_by_sub_area.get_mut(&corner.sub_area_id) {
                siblings.retain(|cid| *cid != id);
            }
            report.corners.push(id);
        }
        report
    }

    fn remove_sub_area_into(&mut self, id: SubAreaId, report: &mut CascadeReport) {
        if self.sub_areas.remove(&id).is_none() {
            return;
        }
        report.sub_areas.push(id);
        let corner_ids = self.corners_by_sub_area.remove(&id).unwrap_or_default();
        for corner_id in corner_ids {
            self.corners.remove(&corner_id);
            report.corners.push(corner_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HierarchyView {
        let mut h = HierarchyView::default();
        h.insert_area(1, "Kitchen", "room", None);
        h.insert_sub_area(10, 1, "Counter", None, None);
        h.insert_sub_area(11, 1, "Pantry", None, None);
        h.insert_corner(100, 10, "Sink corner", None, None);
        h.insert_corner(101, 11, "Shelf corner", None, None);
        h
    }

    #[test]
    fn area_delete_cascades_through_both_levels() {
        let mut h = sample();
        let report = h.remove_area(1);
        assert_eq!(report.areas, vec![1]);
        assert_eq!(report.sub_areas, vec![10, 11]);
        assert_eq!(report.corners, vec![100, 101]);
        assert!(h.areas().is_empty());
        assert!(h.sub_area(10).is_none());
        assert!(h.corner(101).is_none());

        let corner_scope = ScopeRef { scope_type: ScopeType::Corner, scope_id: 100 };
        assert!(report.covers(corner_scope));
    }

    #[test]
    fn sub_area_delete_takes_only_its_corners() {
        let mut h = sample();
        let report = h.remove_sub_area(10);
        assert_eq!(report.sub_areas, vec![10]);
        assert_eq!(report.corners, vec![100]);
        assert!(h.corner(101).is_some());
        assert_eq!(h.sub_areas_of(1).len(), 1);
    }

    #[test]
    fn listings_are_scoped_by_direct_parent() {
        let mut h = sample();
        h.insert_area(2, "Bathroom", "room", None);
        h.insert_sub_area(20, 2, "Shower", None, None);
        assert_eq!(h.sub_areas_of(1).len(), 2);
        assert_eq!(h.sub_areas_of(2).len(), 1);
        assert_eq!(h.corners_of(10).len(), 1);
        assert!(h.corners_of(20).is_empty());
    }

    #[test]
    fn rename_keeps_parentage() {
        let mut h = sample();
        assert!(h.rename_sub_area(10, "Worktop"));
        let sa = h.sub_area(10).unwrap();
        assert_eq!(sa.name, "Worktop");
        assert_eq!(sa.area_id, 1);
        assert!(!h.rename_sub_area(99, "nope"));
    }

    #[test]
    fn owning_area_resolves_transitively() {
        let h = sample();
        let scope = ScopeRef { scope_type: ScopeType::Corner, scope_id: 101 };
        assert_eq!(h.owning_area(scope), Some(1));
        assert!(h.contains(scope));
        let gone = ScopeRef { scope_type: ScopeType::Corner, scope_id: 999 };
        assert!(!h.contains(gone));
    }
}
