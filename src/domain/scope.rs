//! Scope selection and resolution.
//!
//! A task attaches to exactly one hierarchy node: an area, a sub-area, or a
//! corner. `ScopeSelection` tracks the node the user is currently working
//! in; it survives hierarchy edits by narrowing to the nearest valid
//! ancestor level instead of jumping to an unrelated node.

use serde::{Deserialize, Serialize};

use crate::domain::hierarchy::HierarchyView;
use crate::error::{Error, Result};

pub type AreaId = i64;
pub type SubAreaId = i64;
pub type CornerId = i64;
pub type TaskId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Area,
    SubArea,
    Corner,
}

impl ScopeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeType::Area => "area",
            ScopeType::SubArea => "sub_area",
            ScopeType::Corner => "corner",
        }
    }

    pub fn from_db(value: &str) -> Result<Self> {
        match value {
            "area" => Ok(ScopeType::Area),
            "sub_area" => Ok(ScopeType::SubArea),
            "corner" => Ok(ScopeType::Corner),
            other => Err(Error::validation(format!("invalid scope type '{other}'"))),
        }
    }
}

/// The exact node a task is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeRef {
    pub scope_type: ScopeType,
    pub scope_id: i64,
}

/// The user's current position in the hierarchy. Ancestor ids are kept even
/// when a finer level is active, so resolution can fall back when a direct
/// lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSelection {
    pub scope_type: ScopeType,
    pub area_id: Option<AreaId>,
    pub sub_area_id: Option<SubAreaId>,
    pub corner_id: Option<CornerId>,
}

impl Default for ScopeSelection {
    fn default() -> Self {
        ScopeSelection {
            scope_type: ScopeType::Area,
            area_id: None,
            sub_area_id: None,
            corner_id: None,
        }
    }
}

impl ScopeSelection {
    pub fn area(area_id: AreaId) -> Self {
        ScopeSelection {
            scope_type: ScopeType::Area,
            area_id: Some(area_id),
            ..ScopeSelection::default()
        }
    }

    /// The filter used to select tasks, or `None` when the active level has
    /// no id. Task creation must refuse an empty filter.
    pub fn filter(&self) -> Option<ScopeRef> {
        match self.scope_type {
            ScopeType::Corner => self.corner_id.map(|id| ScopeRef {
                scope_type: ScopeType::Corner,
                scope_id: id,
            }),
            ScopeType::SubArea => self.sub_area_id.map(|id| ScopeRef {
                scope_type: ScopeType::SubArea,
                scope_id: id,
            }),
            ScopeType::Area => self.area_id.map(|id| ScopeRef {
                scope_type: ScopeType::Area,
                scope_id: id,
            }),
        }
    }

    /// The area that transitively owns the selected node. Corner resolution
    /// walks corner -> sub-area -> area, falling back to the last known
    /// sub-area and area ids held in the selection when a direct ancestor
    /// lookup fails.
    pub fn resolve_area_id(&self, hierarchy: &HierarchyView) -> Option<AreaId> {
        match self.scope_type {
            ScopeType::Area => self.area_id,
            ScopeType::SubArea => self
                .sub_area_id
                .and_then(|id| hierarchy.area_of_sub_area(id))
                .or(self.area_id),
            ScopeType::Corner => {
                let parent_sub_area = self
                    .corner_id
                    .and_then(|id| hierarchy.corner(id))
                    .map(|c| c.sub_area_id)
                    .or(self.sub_area_id);
                parent_sub_area
                    .and_then(|id| hierarchy.area_of_sub_area(id))
                    .or(self.area_id)
            }
        }
    }

    /// Re-derive a consistent selection after the active level changed:
    /// levels below the active one are cleared, levels above keep their ids,
    /// and an unset active level is seeded with the first available child.
    pub fn normalize(&mut self, hierarchy: &HierarchyView) {
        if self.area_id.is_none() {
            self.area_id = hierarchy.first_area_id();
        }
        match self.scope_type {
            ScopeType::Area => {
                self.sub_area_id = None;
                self.corner_id = None;
            }
            ScopeType::SubArea => {
                self.corner_id = None;
                if self.sub_area_id.is_none() {
                    self.sub_area_id = self
                        .area_id
                        .and_then(|id| hierarchy.first_sub_area_id(id));
                }
            }
            ScopeType::Corner => {
                if self.sub_area_id.is_none() {
                    self.sub_area_id = self
                        .area_id
                        .and_then(|id| hierarchy.first_sub_area_id(id));
                }
                if self.corner_id.is_none() {
                    self.corner_id = self
                        .sub_area_id
                        .and_then(|id| hierarchy.first_corner_id(id));
                }
            }
        }
    }

    /// Called after hierarchy deletions. If the selected node no longer
    /// exists, narrow to the nearest valid ancestor level; with no areas
    /// left the selection becomes empty.
    pub fn narrow_to_valid(&mut self, hierarchy: &HierarchyView) {
        if self.scope_type == ScopeType::Corner
            && self.corner_id.is_some_and(|id| hierarchy.corner(id).is_none())
        {
            self.corner_id = None;
            self.scope_type = if self.sub_area_id.is_some() {
                ScopeType::SubArea
            } else {
                ScopeType::Area
            };
        }
        if self.scope_type == ScopeType::SubArea
            && self
                .sub_area_id
                .is_some_and(|id| hierarchy.sub_area(id).is_none())
        {
            self.sub_area_id = None;
            self.corner_id = None;
            self.scope_type = ScopeType::Area;
        }
        if self.sub_area_id.is_some_and(|id| hierarchy.sub_area(id).is_none()) {
            self.sub_area_id = None;
        }
        if self.area_id.is_some_and(|id| hierarchy.area(id).is_none()) {
            *self = match hierarchy.first_area_id() {
                Some(id) => ScopeSelection::area(id),
                None => ScopeSelection::default(),
            };
        }
    }

    /// Human-readable label for the current selection.
    pub fn label(&self, hierarchy: &HierarchyView) -> String {
        match self.filter() {
            None => "no scope selected".to_string(),
            Some(scope) => match scope.scope_type {
                ScopeType::Area => {
                    let name = hierarchy
                        .area(scope.scope_id)
                        .map_or("?", |a| a.name.as_str());
                    format!("area · {name}")
                }
                ScopeType::SubArea => {
                    let name = hierarchy
                        .sub_area(scope.scope_id)
                        .map_or("?", |sa| sa.name.as_str());
                    format!("sub-area · {name}")
                }
                ScopeType::Corner => {
                    let corner = hierarchy.corner(scope.scope_id);
                    let name = corner.map_or("?", |c| c.name.as_str());
                    let sub = corner
                        .and_then(|c| hierarchy.sub_area(c.sub_area_id))
                        .map_or("?", |sa| sa.name.as_str());
                    format!("corner · {name} ({sub})")
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hierarchy::HierarchyView;

    fn sample() -> HierarchyView {
        let mut h = HierarchyView::default();
        h.insert_area(1, "Kitchen", "room", None);
        h.insert_area(2, "Bathroom", "room", None);
        h.insert_sub_area(10, 1, "Counter", None, None);
        h.insert_corner(100, 10, "Sink corner", None, None);
        h
    }

    #[test]
    fn filter_requires_an_id_at_the_active_level() {
        let mut sel = ScopeSelection::default();
        assert!(sel.filter().is_none());
        sel.area_id = Some(1);
        let filter = sel.filter().unwrap();
        assert_eq!(filter.scope_type, ScopeType::Area);
        assert_eq!(filter.scope_id, 1);

        sel.scope_type = ScopeType::Corner;
        assert!(sel.filter().is_none(), "no corner id selected yet");
    }

    #[test]
    fn corner_resolution_walks_to_the_owning_area() {
        let h = sample();
        let sel = ScopeSelection {
            scope_type: ScopeType::Corner,
            area_id: None,
            sub_area_id: None,
            corner_id: Some(100),
        };
        assert_eq!(sel.resolve_area_id(&h), Some(1));
    }

    #[test]
    fn corner_resolution_falls_back_to_known_ancestors() {
        let h = sample();
        // Corner 999 does not exist; the selection still remembers the
        // sub-area it was under.
        let sel = ScopeSelection {
            scope_type: ScopeType::Corner,
            area_id: Some(2),
            sub_area_id: Some(10),
            corner_id: Some(999),
        };
        assert_eq!(sel.resolve_area_id(&h), Some(1));

        // No sub-area either: last known area wins.
        let sel = ScopeSelection {
            scope_type: ScopeType::Corner,
            area_id: Some(2),
            sub_area_id: None,
            corner_id: Some(999),
        };
        assert_eq!(sel.resolve_area_id(&h), Some(2));
    }

    #[test]
    fn normalize_seeds_first_children() {
        let h = sample();
        let mut sel = ScopeSelection {
            scope_type: ScopeType::Corner,
            area_id: Some(1),
            sub_area_id: None,
            corner_id: None,
        };
        sel.normalize(&h);
        assert_eq!(sel.sub_area_id, Some(10));
        assert_eq!(sel.corner_id, Some(100));

        let mut sel = ScopeSelection {
            scope_type: ScopeType::Area,
            area_id: Some(1),
            sub_area_id: Some(10),
            corner_id: Some(100),
        };
        sel.normalize(&h);
        assert!(sel.sub_area_id.is_none());
        assert!(sel.corner_id.is_none());
    }

    #[test]
    fn narrowing_steps_down_one_level_at_a_time() {
        let mut h = sample();
        let mut sel = ScopeSelection {
            scope_type: ScopeType::Corner,
            area_id: Some(1),
            sub_area_id: Some(10),
            corner_id: Some(100),
        };

        h.remove_corner(100);
        sel.narrow_to_valid(&h);
        assert_eq!(sel.scope_type, ScopeType::SubArea);
        assert_eq!(sel.sub_area_id, Some(10));

        h.remove_sub_area(10);
        sel.narrow_to_valid(&h);
        assert_eq!(sel.scope_type, ScopeType::Area);
        assert_eq!(sel.area_id, Some(1));

        h.remove_area(1);
        sel.narrow_to_valid(&h);
        assert_eq!(sel.area_id, Some(2), "nearest valid area, not arbitrary");

        h.remove_area(2);
        sel.narrow_to_valid(&h);
        assert!(sel.filter().is_none(), "no areas left means empty scope");
    }
}
