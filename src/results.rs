//! Accumulated test results.
//!
//! Tests record two kinds of output against a report heading:
//!
//! - **Spec**: a named numeric result with a unit (`resist_i0 = 10 ohm`).
//! - **ReportEntry**: a saved figure plus free-form info to show with it.
//!
//! Headings keep the order in which they were first used so the rendered report
//! follows the recipe.

use crate::figure::FigureSummary;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Results shared between the executor and the running test.
pub type SharedResults = Arc<RwLock<ResultsHold>>;

/// A single reported measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    /// Spec name, e.g. `resist_i0`.
    pub name: String,
    /// Unit, e.g. `ohm`.
    pub unit: String,
    /// Measured value. Non-finite values are stored as `"NaN"`, `"inf"` or
    /// `"-inf"` since JSON numbers cannot hold them.
    #[serde(with = "spec_value")]
    pub value: f64,
}

mod spec_value {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_f64(*value)
        } else if value.is_nan() {
            s.serialize_str("NaN")
        } else if value.is_sign_positive() {
            s.serialize_str("inf")
        } else {
            s.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::custom(format!("invalid spec value '{other}'"))),
            },
        }
    }
}

/// A figure and its accompanying information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Where the PNG was written.
    pub figure: PathBuf,
    /// Labels and legend that go with the figure.
    #[serde(default)]
    pub summary: FigureSummary,
    /// Free-form key/value information.
    #[serde(default)]
    pub info: IndexMap<String, Value>,
}

/// Everything recorded under one heading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadingResults {
    /// Specs in recording order.
    #[serde(default)]
    pub specs: Vec<Spec>,
    /// Report entries in recording order.
    #[serde(default)]
    pub entries: Vec<ReportEntry>,
}

/// Holds specs and report entries keyed by report heading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsHold {
    headings: IndexMap<String, HeadingResults>,
}

impl ResultsHold {
    /// Empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh holder for sharing.
    pub fn shared() -> SharedResults {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Records a spec under `heading`. A spec with the same name under the same
    /// heading is replaced.
    pub fn add_spec(
        &mut self,
        heading: &str,
        spec: impl Into<String>,
        unit: impl Into<String>,
        value: f64,
    ) {
        let spec = Spec {
            name: spec.into(),
            unit: unit.into(),
            value,
        };
        tracing::info!(heading, spec = %spec.name, value, unit = %spec.unit, "Spec recorded");
        let specs = &mut self.heading_mut(heading).specs;
        match specs.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => *existing = spec,
            None => specs.push(spec),
        }
    }

    /// Appends a report entry under `heading`.
    pub fn add_report_entry(&mut self, heading: &str, entry: ReportEntry) {
        tracing::debug!(heading, figure = %entry.figure.display(), "Report entry added");
        self.heading_mut(heading).entries.push(entry);
    }

    fn heading_mut(&mut self, heading: &str) -> &mut HeadingResults {
        self.headings.entry(heading.to_string()).or_default()
    }

    /// Headings in first-use order.
    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.headings.keys().map(String::as_str)
    }

    /// Everything recorded under `heading`.
    pub fn heading(&self, heading: &str) -> Option<&HeadingResults> {
        self.headings.get(heading)
    }

    /// Specs recorded under `heading`.
    pub fn specs(&self, heading: &str) -> &[Spec] {
        self.headings
            .get(heading)
            .map(|h| h.specs.as_slice())
            .unwrap_or_default()
    }

    /// A single spec by name.
    pub fn spec(&self, heading: &str, name: &str) -> Option<&Spec> {
        self.specs(heading).iter().find(|s| s.name == name)
    }

    /// Report entries recorded under `heading`.
    pub fn entries(&self, heading: &str) -> &[ReportEntry] {
        self.headings
            .get(heading)
            .map(|h| h.entries.as_slice())
            .unwrap_or_default()
    }

    /// Total number of specs across all headings.
    pub fn spec_count(&self) -> usize {
        self.headings.values().map(|h| h.specs.len()).sum()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
    }

    /// Writes all results as pretty JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str) -> ReportEntry {
        ReportEntry {
            figure: PathBuf::from(name),
            summary: FigureSummary::default(),
            info: IndexMap::from([("a".to_string(), json!("hello world"))]),
        }
    }

    #[test]
    fn test_specs_grouped_by_heading_in_first_use_order() {
        let mut results = ResultsHold::new();
        results.add_spec("B", "resist_i0", "ohm", 10.0);
        results.add_spec("A", "gain", "dB", 3.0);
        results.add_spec("B", "resist_i1", "ohm", 20.0);

        assert_eq!(results.headings().collect::<Vec<_>>(), vec!["B", "A"]);
        assert_eq!(results.specs("B").len(), 2);
        assert_eq!(results.spec("B", "resist_i1").unwrap().value, 20.0);
        assert!(results.spec("A", "resist_i1").is_none());
        assert_eq!(results.spec_count(), 3);
    }

    #[test]
    fn test_duplicate_spec_replaces_value() {
        let mut results = ResultsHold::new();
        results.add_spec("H", "resist_i0", "ohm", 9.0);
        results.add_spec("H", "resist_i0", "ohm", 10.0);
        assert_eq!(results.specs("H").len(), 1);
        assert_eq!(results.spec("H", "resist_i0").unwrap().value, 10.0);
    }

    #[test]
    fn test_unknown_heading_is_empty() {
        let results = ResultsHold::new();
        assert!(results.specs("nope").is_empty());
        assert!(results.entries("nope").is_empty());
        assert!(results.is_empty());
    }

    #[test]
    fn test_json_output_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut results = ResultsHold::new();
        results.add_spec("IV", "resist_i0", "ohm", 10.0);
        results.add_report_entry("IV", entry("iv.png"));

        results.to_json(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: ResultsHold = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded, results);
        assert_eq!(loaded.entries("IV")[0].info["a"], json!("hello world"));
    }

    #[test]
    fn test_non_finite_specs_survive_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut results = ResultsHold::new();
        results.add_spec("IV", "open_circuit", "ohm", f64::INFINITY);
        results.add_spec("IV", "reverse", "ohm", f64::NEG_INFINITY);
        results.add_spec("IV", "no_fit", "ohm", f64::NAN);
        results.add_spec("IV", "resist_i0", "ohm", 10.0);

        results.to_json(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"NaN\""));

        let loaded: ResultsHold = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.spec("IV", "open_circuit").unwrap().value, f64::INFINITY);
        assert_eq!(loaded.spec("IV", "reverse").unwrap().value, f64::NEG_INFINITY);
        assert!(loaded.spec("IV", "no_fit").unwrap().value.is_nan());
        assert_eq!(loaded.spec("IV", "resist_i0").unwrap().value, 10.0);
    }

    #[test]
    fn test_unknown_spec_text_rejected() {
        let text = r#"{"IV": {"specs": [{"name": "x", "unit": "V", "value": "lots"}]}}"#;
        assert!(serde_json::from_str::<ResultsHold>(text).is_err());
    }
}
