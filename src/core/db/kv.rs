//! Durable key/value collaborator: points ledger, scope memory.

use std::future::Future;

use crate::error::Result;

pub trait KvStore {
    fn kv_get(&self, key: &str) -> impl Future<Output = Result<Option<String>>>;
    fn kv_set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>>;
}
