//! Test harness for isolated orchestrator runs.
//!
//! Each `TestHarness` owns a temp directory holding the database, uploads
//! and outputs, and builds orchestrators wired to `FakeTools`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use voxreel::config::Config;
use voxreel::{JobStatus, JobStore, JobView, Orchestrator};

use super::builders::ConfigBuilder;
use super::fake_tools::FakeTools;

pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|builder| builder)
    }

    /// Creates a harness whose config is adjusted by `customize`.
    pub fn with_config(customize: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = customize(ConfigBuilder::new(temp_dir.path())).build();
        Self { temp_dir, config }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.config.storage.outputs_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.config.storage.database_path
    }

    /// Opens (or reopens) the on-disk store.
    pub fn open_store(&self) -> JobStore {
        JobStore::open(self.database_path()).expect("Failed to open job store")
    }

    /// An orchestrator over the on-disk store using the given fake tools.
    /// The worker pool is not started.
    pub fn orchestrator(&self, tools: Arc<FakeTools>) -> Orchestrator {
        Orchestrator::new(self.config.clone(), self.open_store(), tools)
    }

    /// Writes a placeholder audio file outside the uploads directory.
    pub fn write_audio(&self, filename: &str) -> PathBuf {
        let dir = self.temp_path().join("incoming");
        std::fs::create_dir_all(&dir).expect("Failed to create audio dir");
        let path = dir.join(filename);
        std::fs::write(&path, b"ID3\x03\x00\x00\x00").expect("Failed to write audio file");
        path
    }
}

/// Polls until the job is terminal, collecting every progress value seen.
pub fn wait_for_terminal(orchestrator: &Orchestrator, id: &str) -> (JobView, Vec<u8>) {
    let deadline = Instant::now() + Duration::from_secs(20);
    let mut seen = Vec::new();
    loop {
        let view = orchestrator.job(id).expect("job should exist");
        seen.push(view.progress);
        if matches!(view.status, JobStatus::Done | JobStatus::Failed) {
            return (view, seen);
        }
        assert!(
            Instant::now() < deadline,
            "job {} did not finish; last state {:?}",
            id,
            view.status
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Polls until `check` holds for the job.
pub fn wait_until(orchestrator: &Orchestrator, id: &str, check: impl Fn(&JobView) -> bool) -> JobView {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let view = orchestrator.job(id).expect("job should exist");
        if check(&view) {
            return view;
        }
        assert!(Instant::now() < deadline, "condition not reached for job {}", id);
        std::thread::sleep(Duration::from_millis(5));
    }
}
