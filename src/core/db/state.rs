//! Project file lifecycle.
//!
//! A project lives in a single `tar.zst` archive. Opening it unpacks the
//! archive into a temporary working directory holding the SQLite database
//! and the photo files; saving checkpoints the WAL, closes the pool and
//! re-packs the working directory over the original file.

use std::{
    fs::{self, File},
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use tar::{Archive, Builder};
use tempdir::TempDir;
use tokio::{
    fs as async_fs,
    sync::{RwLock, RwLockReadGuard},
};
use uuid::Uuid;
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

use crate::error::{Error, Result};

const DB_FILE_NAME: &str = "project.db";
const PHOTO_DIR_NAME: &str = "photos";
const ZSTD_LEVEL: i32 = 3;

pub(super) struct ProjectState {
    project_file: PathBuf,
    working_dir: TempDir,
    pool: RwLock<SqlitePool>,
}

impl std::fmt::Debug for ProjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectState")
            .field("project_file", &self.project_file)
            .field("working_dir", &self.working_dir.path())
            .finish()
    }
}

impl ProjectState {
    pub(super) async fn new<P: AsRef<Path>>(project_file: P) -> Result<Self> {
        let project_file = project_file.as_ref().to_path_buf();

        if !project_file.is_file() {
            if project_file.parent().map(Path::is_dir).unwrap_or(false) {
                write_empty_archive(&project_file)?;
            } else {
                return Err(Error::External(anyhow::anyhow!(
                    "project file parent does not exist: {project_file:?}"
                )));
            }
        }

        let working_dir = TempDir::new("renoplan_project")?;
        unpack_archive(&project_file, working_dir.path())?;

        let db_file = working_dir.path().join(DB_FILE_NAME);
        let photos_dir = working_dir.path().join(PHOTO_DIR_NAME);
        match (db_file.is_file(), photos_dir.is_dir()) {
            (true, true) => {}
            (false, false) => {
                fs::create_dir_all(&photos_dir)?;
                File::create(&db_file)?;
            }
            (db_exists, _) => {
                return Err(Error::External(anyhow::anyhow!(
                    "corrupt project archive: {} is missing",
                    if db_exists { "photo directory" } else { "database" }
                )));
            }
        }

        let pool = open_pool(&db_file).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            project_file,
            working_dir,
            pool: RwLock::new(pool),
        })
    }

    /// Acquire a pooled connection, holding the pool read lock for the
    /// lifetime of the guard so a concurrent save cannot close the pool
    /// under a running query.
    pub(super) async fn conn(&self) -> Result<DbConnGuard<'_>> {
        let pool_guard = self.pool.read().await;
        let conn = pool_guard.acquire().await?;
        Ok(DbConnGuard { _pool_guard: pool_guard, conn })
    }

    /// Copy a photo file into the working directory, returning the stored
    /// filename.
    pub(super) async fn store_photo<P: AsRef<Path>>(&self, source: P) -> Result<String> {
        let source = source.as_ref();
        let ext = source
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| Error::validation(format!("photo {source:?} has no usable extension")))?;
        let fname = format!("{}.{ext}", Uuid::new_v4());
        let dest = self.working_dir.path().join(PHOTO_DIR_NAME).join(&fname);
        async_fs::copy(source, &dest).await.map_err(|err| {
            Error::External(anyhow::anyhow!(
                "failed to copy photo {source:?} to {dest:?}: {err}"
            ))
        })?;
        Ok(fname)
    }

    pub(super) async fn delete_photo(&self, fname: &str) -> Result<()> {
        let path = self.working_dir.path().join(PHOTO_DIR_NAME).join(fname);
        match async_fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone is fine; the flag is the source of truth.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub(super) fn photo_path(&self, fname: &str) -> PathBuf {
        self.working_dir.path().join(PHOTO_DIR_NAME).join(fname)
    }

    /// Checkpoint, close, pack, and (optionally) reopen. Takes the write
    /// lock so no query runs while files are being archived.
    pub(super) async fn close_and_pack(&self, reopen: bool) -> Result<()> {
        let mut pool_guard = self.pool.write().await;

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&*pool_guard)
            .await?;
        pool_guard.close().await;

        pack_archive(&self.project_file, self.working_dir.path())?;

        if reopen {
            let db_file = self.working_dir.path().join(DB_FILE_NAME);
            *pool_guard = open_pool(&db_file).await?;
        }
        Ok(())
    }

    pub(super) async fn save_project(&self) -> Result<()> {
        self.close_and_pack(true).await
    }
}

impl Drop for ProjectState {
    fn drop(&mut self) {
        // Inside a runtime we cannot block; callers must save_project()
        // explicitly before dropping (tests do). Outside one, spin up a
        // throwaway runtime so a CLI exit always packs the archive.
        if tokio::runtime::Handle::try_current().is_ok() {
            return;
        }
        let result = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(self.close_and_pack(false)),
            Err(err) => Err(err.into()),
        };
        if let Err(err) = result {
            tracing::warn!(%err, "failed to save project on drop");
        }
    }
}

async fn open_pool(db_file: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_file)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);
    Ok(SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?)
}

fn write_empty_archive(project_file: &Path) -> Result<()> {
    let out = File::create(project_file)?;
    let encoder = ZstdEncoder::new(out, ZSTD_LEVEL)?;
    let tar = Builder::new(encoder);
    let encoder = tar
        .into_inner()
        .map_err(|err| Error::External(anyhow::anyhow!("failed to finalize empty tar: {err}")))?;
    encoder.finish()?;
    Ok(())
}

fn unpack_archive(project_file: &Path, dest: &Path) -> Result<()> {
    let file = File::open(project_file)?;
    let decoder = ZstdDecoder::new(file).map_err(|err| {
        Error::External(anyhow::anyhow!("invalid zstd stream in {project_file:?}: {err}"))
    })?;
    let mut archive = Archive::new(decoder);
    archive.unpack(dest).map_err(|err| {
        Error::External(anyhow::anyhow!(
            "failed to extract {project_file:?} into {dest:?}: {err}"
        ))
    })?;
    Ok(())
}

fn pack_archive(project_file: &Path, working_dir: &Path) -> Result<()> {
    if let Some(parent) = project_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let out = File::create(project_file)?;
    let encoder = ZstdEncoder::new(out, ZSTD_LEVEL)?;
    let mut tar = Builder::new(encoder);
    tar.append_dir_all(".", working_dir)?;
    let encoder = tar
        .into_inner()
        .map_err(|err| Error::External(anyhow::anyhow!("failed to finalize tar: {err}")))?;
    encoder.finish()?;
    Ok(())
}

pub struct DbConnGuard<'a> {
    _pool_guard: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl Deref for DbConnGuard<'_> {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for DbConnGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
