pub mod hierarchy;
pub mod metrics;
pub mod normalize;
pub mod points;
pub mod scope;
pub mod task;

pub use hierarchy::{Area, CascadeReport, Corner, HierarchyView, SubArea};
pub use metrics::{BudgetIndicators, DeadlineIndicators, Progress};
pub use normalize::{MoveDirection, Status, TaskForm, TaskPatch, TaskPatchForm, Weight};
pub use points::PointsLedger;
pub use scope::{AreaId, CornerId, ScopeRef, ScopeSelection, ScopeType, SubAreaId, TaskId};
pub use task::{NewTask, Task};
