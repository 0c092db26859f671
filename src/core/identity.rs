//! Who is working on the project, and where their lifetime points live.
//!
//! Identity is deliberately thin: a single-user install answers with a fixed
//! id, a future sync backend would answer with an account id. Award flows
//! only ever see the trait.

use std::future::Future;

use crate::core::db::{KvStore, ProjectDb};
use crate::error::{Error, Result};

pub trait Identity {
    fn current_user_id(&self) -> &str;
}

/// Single-user identity for local project files.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    user_id: String,
}

impl LocalIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Resolves to the OS login name, falling back to a fixed id when the
    /// environment does not provide one.
    pub fn from_env() -> Self {
        let user_id = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "local".to_string());
        Self { user_id }
    }
}

impl Identity for LocalIdentity {
    fn current_user_id(&self) -> &str {
        &self.user_id
    }
}

/// Lifetime points accumulator, separate from the per-project ledger so the
/// award flow can confirm the credit landed before marking the ledger.
pub trait ProfileStore {
    fn add_lifetime_points(&self, user_id: &str, delta: i64) -> impl Future<Output = Result<()>>;
    fn lifetime_points(&self, user_id: &str) -> impl Future<Output = Result<i64>>;
}

fn profile_key(user_id: &str) -> String {
    format!("profile_points_{user_id}")
}

impl ProfileStore for ProjectDb {
    async fn add_lifetime_points(&self, user_id: &str, delta: i64) -> Result<()> {
        let key = profile_key(user_id);
        let current = self.lifetime_points(user_id).await?;
        self.kv_set(&key, &(current + delta).to_string()).await
    }

    async fn lifetime_points(&self, user_id: &str) -> Result<i64> {
        match self.kv_get(&profile_key(user_id)).await? {
            Some(raw) => raw.parse().map_err(|_| {
                Error::External(anyhow::anyhow!("unreadable points balance '{raw}'"))
            }),
            None => Ok(0),
        }
    }
}
