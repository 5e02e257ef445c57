//! Test abstraction
//!
//! Every test runs in two phases:
//!
//! ```text
//! run_acquire(&InstrumentManager) ──save_data──▶ <save_path>/{data.json, <key>.csv}
//!                                                          │
//! run_analysis(&headings) ◀────────load_data───────────────┘
//!        │
//!        └──▶ figures under <save_path>, specs/entries into ResultsHold
//! ```
//!
//! Acquisition and analysis only communicate through the files on disk, so an
//! analysis can be re-run later against saved data.

use crate::error::{AppResult, AutosweepError, SweepError};
use crate::instruments::InstrumentManager;
use crate::metadata::DUTInfo;
use crate::results::SharedResults;
use crate::sweep::Sweep;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Manifest listing the sweeps saved by a test.
pub const DATA_MANIFEST: &str = "data.json";

/// Capability: a test that can acquire and analyse.
#[async_trait]
pub trait AbsTest: Send {
    /// Registered type name.
    fn name(&self) -> &str;

    /// Shared state and persistence helpers.
    fn base(&self) -> &TestBase;

    /// Acquires raw data and persists it with [`TestBase::save_data`].
    async fn run_acquire(&mut self, instruments: &InstrumentManager) -> AppResult<()>;

    /// Reloads saved data, records specs and report entries under `report_headings`.
    async fn run_analysis(&mut self, report_headings: &[String]) -> AppResult<()>;
}

/// Everything a test factory needs to build a test.
#[derive(Debug, Clone)]
pub struct TestContext {
    /// Device under test.
    pub dut_info: DUTInfo,
    /// Where specs and report entries go.
    pub results: SharedResults,
    /// Folder for this test's raw data and figures.
    pub save_path: PathBuf,
    /// Emulated acquisition latency for virtual tests.
    pub acquire_delay: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataManifest {
    sweeps: Vec<String>,
    #[serde(default)]
    metadata: Option<Value>,
    saved_at: DateTime<Utc>,
}

/// State common to all tests.
#[derive(Debug)]
pub struct TestBase {
    /// Device under test.
    pub dut_info: DUTInfo,
    /// Where specs and report entries go.
    pub results: SharedResults,
    /// Folder for raw data and figures.
    pub save_path: PathBuf,
    /// Sweeps populated by [`TestBase::load_data`].
    pub sweeps: IndexMap<String, Sweep>,
    /// Metadata populated by [`TestBase::load_data`].
    pub metadata: Option<Value>,
}

impl TestBase {
    /// Base writing under `save_path`.
    pub fn new(dut_info: DUTInfo, results: SharedResults, save_path: impl Into<PathBuf>) -> Self {
        Self {
            dut_info,
            results,
            save_path: save_path.into(),
            sweeps: IndexMap::new(),
            metadata: None,
        }
    }

    /// Builds the base from a factory context.
    pub fn from_context(ctx: &TestContext) -> Self {
        Self::new(ctx.dut_info.clone(), ctx.results.clone(), ctx.save_path.clone())
    }

    /// Writes each sweep to `<key>.csv` and a manifest naming them.
    pub fn save_data(
        &self,
        sweeps: IndexMap<String, Sweep>,
        metadata: Option<Value>,
    ) -> AppResult<()> {
        std::fs::create_dir_all(&self.save_path)?;
        for (key, sweep) in &sweeps {
            let path = self.sweep_path(key)?;
            sweep.write_csv(&path)?;
            tracing::debug!(sweep = %key, path = %path.display(), points = sweep.len(), "Sweep saved");
        }

        let manifest = DataManifest {
            sweeps: sweeps.keys().cloned().collect(),
            metadata,
            saved_at: Utc::now(),
        };
        let writer = BufWriter::new(File::create(self.save_path.join(DATA_MANIFEST))?);
        serde_json::to_writer_pretty(writer, &manifest)?;
        Ok(())
    }

    /// Reads the manifest and every sweep it lists into `self.sweeps`.
    pub fn load_data(&mut self) -> AppResult<()> {
        let reader = BufReader::new(File::open(self.save_path.join(DATA_MANIFEST))?);
        let manifest: DataManifest = serde_json::from_reader(reader)?;

        let mut sweeps = IndexMap::with_capacity(manifest.sweeps.len());
        for key in manifest.sweeps {
            let sweep = Sweep::read_csv(self.sweep_path(&key)?)?;
            sweeps.insert(key, sweep);
        }
        tracing::debug!(count = sweeps.len(), path = %self.save_path.display(), "Sweeps loaded");
        self.sweeps = sweeps;
        self.metadata = manifest.metadata;
        Ok(())
    }

    /// A loaded sweep by key.
    pub fn sweep(&self, key: &str) -> AppResult<&Sweep> {
        self.sweeps
            .get(key)
            .ok_or_else(|| AutosweepError::MissingSweep(key.to_string()))
    }

    /// Path of a file under this test's folder.
    pub fn path(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.save_path.join(file_name)
    }

    fn sweep_path(&self, key: &str) -> Result<PathBuf, SweepError> {
        if key.is_empty() || key.contains(&['/', '\\', '.'][..]) {
            return Err(SweepError::Malformed(format!(
                "'{key}' cannot be used as a sweep key"
            )));
        }
        Ok(self.save_path.join(format!("{key}.csv")))
    }
}
