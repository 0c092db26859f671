mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from renoplan for tests
pub use renoplan::core::db::{
    AreaRepository, CornerRepository, KvStore, NewArea, NewCorner, NewSubArea, PhotoSlot,
    ProjectDb, ProjectRepository, SubAreaRepository, TaskRepository,
};
pub use renoplan::domain::normalize::{MoveDirection, Status, TaskForm, TaskPatchForm, Weight};
pub use renoplan::domain::scope::{ScopeRef, ScopeType};
pub use renoplan::{Error, LocalIdentity, ProfileStore, ProjectController};
