pub mod controller;
pub mod core;
pub mod domain;
pub mod error;

pub use controller::{Dashboard, Event, ProjectController, Store};
pub use core::db::ProjectDb;
pub use core::identity::{Identity, LocalIdentity, ProfileStore};
pub use error::{Error, Result};
