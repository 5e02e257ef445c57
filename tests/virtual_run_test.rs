//! End-to-end runs of recipes through `TestExec`.

use async_trait::async_trait;
use autosweep::exec::{RECIPE_FILE, REPORT_FILE, RESULTS_FILE};
use autosweep::instruments::{InstrumentManager, MockInstrument};
use autosweep::registry::TestRegistry;
use autosweep::test_case::{AbsTest, TestBase, TestContext, DATA_MANIFEST};
use autosweep::virtual_test::IV_FIGURE;
use autosweep::{AppResult, AutosweepError, DUTInfo, Recipe, ResultsHold, Sweep, TestExec};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn recipe(value: Value) -> Recipe {
    match value {
        Value::Object(map) => Recipe::from_dict(map),
        other => panic!("recipe must be an object, got {other}"),
    }
}

fn exec(dir: &std::path::Path) -> TestExec {
    TestExec::new(dir).with_acquire_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_virtual_recipe_produces_full_run_folder() {
    let dir = tempfile::tempdir().unwrap();
    let dut = DUTInfo::new("SN-100");
    let recipe = recipe(json!({
        "name": "virtual characterization",
        "tests": [["virtual", "IV sweep"], ["virtual"]]
    }));

    let summary = exec(dir.path()).run(&recipe, &dut).await.unwrap();

    assert_eq!(summary.tests_run, 2);
    assert_eq!(summary.spec_count, 4);
    assert!(summary.run_dir.starts_with(dir.path().join("SN-100")));
    assert_eq!(summary.results_path, summary.run_dir.join(RESULTS_FILE));
    assert_eq!(summary.report_path, summary.run_dir.join(REPORT_FILE));

    for test_dir in ["0_virtual", "1_virtual"] {
        let test_dir = summary.run_dir.join(test_dir);
        assert!(test_dir.join(DATA_MANIFEST).is_file());
        assert!(test_dir.join("iv.csv").is_file());
        assert!(test_dir.join(IV_FIGURE).is_file());
    }

    let saved = Recipe::from_json(summary.run_dir.join(RECIPE_FILE)).unwrap();
    assert_eq!(saved, recipe);

    let results: ResultsHold =
        serde_json::from_str(&std::fs::read_to_string(&summary.results_path).unwrap()).unwrap();
    assert_eq!(
        results.headings().collect::<Vec<_>>(),
        vec!["IV sweep", "virtual"]
    );
    assert_eq!(results.spec("IV sweep", "resist_i0").unwrap().value, 10.0);
    assert_eq!(results.spec("IV sweep", "resist_i1").unwrap().value, 20.0);
    assert_eq!(results.spec("virtual", "resist_i1").unwrap().unit, "ohm");

    let report = std::fs::read_to_string(&summary.report_path).unwrap();
    assert!(report.contains("SN-100"));
    assert!(report.contains("IV sweep"));
    assert!(report.contains("resist_i0"));
    assert!(report.contains("0_virtual/iv.png"));
}

#[tokio::test]
async fn test_saved_sweep_reloads_from_run_folder() {
    let dir = tempfile::tempdir().unwrap();
    let summary = exec(dir.path())
        .run(&recipe(json!({"tests": [["virtual", "IV"]]})), &DUTInfo::new("SN-7"))
        .await
        .unwrap();

    let iv = Sweep::read_csv(summary.run_dir.join("0_virtual").join("iv.csv")).unwrap();
    assert_eq!(iv.names().collect::<Vec<_>>(), vec!["v", "i0", "i1"]);
    assert_eq!(iv.len(), 21);
    assert_eq!(iv.get_axis_labels()["v"], "Voltage (V)");
}

#[tokio::test]
async fn test_unknown_test_fails_before_creating_run_folder() {
    let dir = tempfile::tempdir().unwrap();
    let result = exec(dir.path())
        .run(
            &recipe(json!({"tests": [["virtual"], ["spectrum"]]})),
            &DUTInfo::new("SN-1"),
        )
        .await;

    assert!(matches!(result, Err(AutosweepError::UnknownTest(name)) if name == "spectrum"));
    assert!(!dir.path().join("SN-1").exists());
}

#[tokio::test]
async fn test_repeated_runs_get_separate_folders() {
    let dir = tempfile::tempdir().unwrap();
    let exec = exec(dir.path());
    let recipe = recipe(json!({"tests": [["virtual"]]}));
    let dut = DUTInfo::new("SN-2");

    let first = exec.run(&recipe, &dut).await.unwrap();
    let second = exec.run(&recipe, &dut).await.unwrap();

    assert_ne!(first.run_dir, second.run_dir);
    assert_ne!(first.run_id, second.run_id);
    assert!(first.results_path.is_file());
    assert!(second.results_path.is_file());
}

/// Test that reads the identification of every instrument and reports how many
/// answered.
struct IdentifyTest {
    base: TestBase,
}

#[async_trait]
impl AbsTest for IdentifyTest {
    fn name(&self) -> &str {
        "identify"
    }

    fn base(&self) -> &TestBase {
        &self.base
    }

    async fn run_acquire(&mut self, instruments: &InstrumentManager) -> AppResult<()> {
        let mut idns = Vec::new();
        for id in instruments.ids() {
            if let Some(instrument) = instruments.get(id) {
                idns.push(json!(instrument.identify().await?));
            }
        }
        let count = vec![idns.len() as f64];
        let sweep = Sweep::new([("count", count)], [("count", ("Instruments", "n"))])?;
        self.base
            .save_data(IndexMap::from([("count".to_string(), sweep)]), Some(json!(idns)))
    }

    async fn run_analysis(&mut self, report_headings: &[String]) -> AppResult<()> {
        self.base.load_data()?;
        let count = self.base.sweep("count")?.trace("count").unwrap_or_default()[0];
        let mut results = self.base.results.write().await;
        for heading in report_headings {
            results.add_spec(heading, "instruments", "n", count);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_custom_test_sees_registered_instruments() {
    let dir = tempfile::tempdir().unwrap();

    let mut registry = TestRegistry::with_builtin();
    registry.register("identify", |ctx: TestContext| {
        Box::new(IdentifyTest {
            base: TestBase::from_context(&ctx),
        })
    });
    let mut instruments = InstrumentManager::new();
    instruments
        .register(Arc::new(MockInstrument::new("smu")))
        .unwrap();
    instruments
        .register(Arc::new(MockInstrument::new("dmm")))
        .unwrap();

    let summary = exec(dir.path())
        .with_registry(registry)
        .with_instruments(instruments)
        .run(
            &recipe(json!({"tests": [["identify", "Bench", "Summary"], ["virtual", "IV"]]})),
            &DUTInfo::new("SN-3"),
        )
        .await
        .unwrap();

    let results: ResultsHold =
        serde_json::from_str(&std::fs::read_to_string(&summary.results_path).unwrap()).unwrap();
    assert_eq!(results.spec("Bench", "instruments").unwrap().value, 2.0);
    assert_eq!(results.spec("Summary", "instruments").unwrap().value, 2.0);
    assert_eq!(results.spec("IV", "resist_i0").unwrap().value, 10.0);

    let manifest: Value = serde_json::from_str(
        &std::fs::read_to_string(summary.run_dir.join("0_identify").join(DATA_MANIFEST)).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["metadata"].as_array().unwrap().len(), 2);
}
