//! Recipe execution.
//!
//! [`TestExec`] runs every test of a [`Recipe`] in order against one device:
//!
//! ```text
//! <output_dir>/<serial>/<YYYYmmdd_HHMMSS>/
//!     recipe.json        copy of the recipe that was run
//!     0_virtual/         one folder per recipe entry: raw data + figures
//!     1_virtual/
//!     results.json       every spec and report entry
//!     report.html
//! ```
//!
//! Tests run strictly one after another; acquisition always completes before the
//! analysis of the same test starts. The first error aborts the run.

use crate::config::AppConfig;
use crate::error::{AppResult, AutosweepError};
use crate::instruments::InstrumentManager;
use crate::metadata::DUTInfo;
use crate::recipe::Recipe;
use crate::registry::TestRegistry;
use crate::report::write_report;
use crate::results::{ResultsHold, SharedResults};
use crate::test_case::TestContext;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, info_span, Instrument as _};
use uuid::Uuid;

/// Copy of the recipe stored in every run folder.
pub const RECIPE_FILE: &str = "recipe.json";
/// Results file in every run folder.
pub const RESULTS_FILE: &str = "results.json";
/// Report file in every run folder.
pub const REPORT_FILE: &str = "report.html";

/// A recipe entry resolved into something runnable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTest {
    /// Position in `recipe["tests"]`.
    pub index: usize,
    /// Registered test name.
    pub name: String,
    /// Headings passed to analysis; never empty.
    pub headings: Vec<String>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique ID of this run.
    pub run_id: Uuid,
    /// Folder holding everything the run wrote.
    pub run_dir: PathBuf,
    /// Number of recipe entries executed.
    pub tests_run: usize,
    /// Number of specs recorded.
    pub spec_count: usize,
    /// Path of `results.json`.
    pub results_path: PathBuf,
    /// Path of `report.html`.
    pub report_path: PathBuf,
    /// Wall-clock duration, serialized as seconds.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        f64::deserialize(d).map(Duration::from_secs_f64)
    }
}

/// Runs recipes against a device.
#[derive(Debug)]
pub struct TestExec {
    registry: TestRegistry,
    instruments: InstrumentManager,
    output_dir: PathBuf,
    acquire_delay: Duration,
    app_name: String,
}

impl TestExec {
    /// Executor with the built-in tests and no instruments.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry: TestRegistry::with_builtin(),
            instruments: InstrumentManager::new(),
            output_dir: output_dir.into(),
            acquire_delay: crate::config::ExecutionConfig::default().acquire_delay(),
            app_name: crate::config::ApplicationConfig::default().name,
        }
    }

    /// Executor configured from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.storage.output_dir)
            .with_acquire_delay(config.execution.acquire_delay())
            .with_app_name(&config.application.name)
    }

    /// Replaces the test registry.
    pub fn with_registry(mut self, registry: TestRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Instruments handed to every acquisition and closed after the run.
    pub fn with_instruments(mut self, instruments: InstrumentManager) -> Self {
        self.instruments = instruments;
        self
    }

    /// Acquisition delay passed to virtual tests.
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Sets the application name attached to run logs.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Application name attached to run logs.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Tests this executor can build.
    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    /// Resolves every recipe entry without running anything.
    ///
    /// # Errors
    /// Fails on a malformed recipe, an entry without a test name, or an unknown test.
    pub fn plan(&self, recipe: &Recipe) -> AppResult<Vec<PlannedTest>> {
        let mut planned = Vec::new();
        for (index, tuple) in recipe.tests()?.enumerate() {
            let tuple = tuple?;
            let name = tuple
                .test_name()
                .ok_or_else(|| AutosweepError::InvalidRecipeEntry {
                    index,
                    reason: "first element must be the test name".to_string(),
                })?;
            if !self.registry.is_available(name) {
                return Err(AutosweepError::UnknownTest(name.to_string()));
            }
            let mut headings = tuple.headings();
            if headings.is_empty() {
                headings.push(name.to_string());
            }
            planned.push(PlannedTest {
                index,
                name: name.to_string(),
                headings,
            });
        }
        Ok(planned)
    }

    /// Runs every test of `recipe` and writes results and report.
    ///
    /// Every registered instrument is closed once the run ends, whether it
    /// succeeded or not. A run error takes precedence over a close error.
    pub async fn run(&self, recipe: &Recipe, dut_info: &DUTInfo) -> AppResult<RunSummary> {
        let outcome = self.run_recipe(recipe, dut_info).await;
        let closed = self.instruments.close_all().await;
        match (outcome, closed) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!(error = %close_err, "Instrument shutdown failed after run error");
                }
                Err(e)
            }
        }
    }

    async fn run_recipe(&self, recipe: &Recipe, dut_info: &DUTInfo) -> AppResult<RunSummary> {
        dut_info.validate().map_err(AutosweepError::Configuration)?;
        let planned = self.plan(recipe)?;

        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let run_dir = self.new_run_dir(dut_info)?;
        recipe.to_json(run_dir.join(RECIPE_FILE))?;
        info!(
            app = %self.app_name,
            run_id = %run_id,
            serial = %dut_info.serial_number,
            tests = planned.len(),
            run_dir = %run_dir.display(),
            "Starting run"
        );

        let results: SharedResults = ResultsHold::shared();
        for test in &planned {
            let span = info_span!("test", index = test.index, name = %test.name);
            self.run_one(test, dut_info, &results, &run_dir)
                .instrument(span)
                .await?;
        }

        let results = results.read().await;
        let results_path = run_dir.join(RESULTS_FILE);
        let report_path = run_dir.join(REPORT_FILE);
        results.to_json(&results_path)?;
        write_report(&report_path, dut_info, &results)?;

        let summary = RunSummary {
            run_id,
            run_dir,
            tests_run: planned.len(),
            spec_count: results.spec_count(),
            results_path,
            report_path,
            elapsed: started.elapsed(),
        };
        info!(
            app = %self.app_name,
            run_id = %run_id,
            tests = summary.tests_run,
            specs = summary.spec_count,
            elapsed_s = summary.elapsed.as_secs_f64(),
            "Run complete"
        );
        Ok(summary)
    }

    async fn run_one(
        &self,
        planned: &PlannedTest,
        dut_info: &DUTInfo,
        results: &SharedResults,
        run_dir: &std::path::Path,
    ) -> AppResult<()> {
        let ctx = TestContext {
            dut_info: dut_info.clone(),
            results: results.clone(),
            save_path: run_dir.join(format!("{}_{}", planned.index, planned.name)),
            acquire_delay: self.acquire_delay,
        };
        let mut test = self.registry.create(&planned.name, ctx)?;

        info!("Acquiring");
        test.run_acquire(&self.instruments).await?;
        info!(headings = ?planned.headings, "Analysing");
        test.run_analysis(&planned.headings).await?;
        Ok(())
    }

    /// Creates `<output_dir>/<serial>/<timestamp>`, suffixing the timestamp when a
    /// run from the same second already exists.
    fn new_run_dir(&self, dut_info: &DUTInfo) -> AppResult<PathBuf> {
        let device_dir = self.output_dir.join(dut_info.serial_number.trim());
        std::fs::create_dir_all(&device_dir)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();

        let mut candidate = device_dir.join(&stamp);
        let mut attempt = 1;
        loop {
            match std::fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    candidate = device_dir.join(format!("{stamp}_{attempt}"));
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
