use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use tempfile::NamedTempFile;

use renoplan::{LocalIdentity, ProfileStore, ProjectController, ProjectDb};

/// Creates a ProjectDb backed by a temporary project file.
/// Returns both the project and the temp directory (which must be kept alive).
pub async fn create_test_project() -> (ProjectDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("test.renoplan");
    let project = ProjectDb::new(&path)
        .await
        .expect("Failed to create test project");
    (project, dir)
}

/// Creates a small photo file to attach to tasks. Keep the handle alive
/// until the attach call copied it into the project.
pub fn create_test_photo() -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".jpg")
        .tempfile()
        .expect("Failed to create temp photo file");
    file.write_all(b"not-really-jpeg-bytes")
        .expect("Failed to write test photo");
    file
}

/// Profile stub that counts calls and can be flipped into failure mode, so
/// tests can observe the award ordering contract.
#[derive(Clone, Default)]
pub struct CountingProfile {
    pub total: Arc<AtomicI64>,
    pub calls: Arc<AtomicI64>,
    pub fail: Arc<AtomicBool>,
}

impl CountingProfile {
    pub fn total_points(&self) -> i64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> i64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

impl ProfileStore for CountingProfile {
    async fn add_lifetime_points(&self, _user_id: &str, delta: i64) -> renoplan::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(renoplan::Error::External(anyhow::anyhow!(
                "profile backend unavailable"
            )));
        }
        self.total.fetch_add(delta, Ordering::SeqCst);
        Ok(())
    }

    async fn lifetime_points(&self, _user_id: &str) -> renoplan::Result<i64> {
        Ok(self.total.load(Ordering::SeqCst))
    }
}

pub type TestController = ProjectController<ProjectDb, LocalIdentity, CountingProfile>;

/// Loads a controller over a fresh project, with the counting profile stub.
pub async fn create_test_controller() -> (TestController, CountingProfile, tempfile::TempDir) {
    let (db, dir) = create_test_project().await;
    let profile = CountingProfile::default();
    let controller = ProjectController::load(db, LocalIdentity::new("tester"), profile.clone())
        .await
        .expect("Failed to load controller");
    (controller, profile, dir)
}
