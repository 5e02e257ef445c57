//! Sweep container for measurement traces.
//!
//! A [`Sweep`] holds equally long `f64` traces in insertion order. The first trace
//! is the independent variable; every other trace is plotted and analysed against
//! it. Each trace carries a `(label, unit)` pair used for axis labels.
//!
//! Sweeps are persisted as CSV. The attributes are written first as a `#`-prefixed
//! JSON comment, the same way storage writers prefix metadata in front of a table:
//!
//! ```text
//! # {"v":{"label":"Voltage","unit":"V"},"i0":{"label":"Current","unit":"A"}}
//! v,i0
//! -1.0,-0.1
//! ```

use crate::error::SweepError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// `num` evenly spaced samples over `[start, stop]`, endpoints included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut samples: Vec<f64> = (0..num).map(|k| start + k as f64 * step).collect();
            samples[num - 1] = stop;
            samples
        }
    }
}

/// Human-readable label and unit of a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAttrs {
    /// Quantity name, e.g. "Voltage".
    pub label: String,
    /// Unit symbol, e.g. "V".
    pub unit: String,
}

impl TraceAttrs {
    /// Creates a new attribute pair.
    pub fn new(label: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
        }
    }

    /// Axis label in the form `Label (unit)`.
    pub fn axis_label(&self) -> String {
        format!("{} ({})", self.label, self.unit)
    }
}

impl<L: Into<String>, U: Into<String>> From<(L, U)> for TraceAttrs {
    fn from((label, unit): (L, U)) -> Self {
        Self::new(label, unit)
    }
}

/// Named measurement traces with per-trace metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    traces: IndexMap<String, Vec<f64>>,
    attrs: IndexMap<String, TraceAttrs>,
}

impl Sweep {
    /// Builds a sweep, checking that every trace has the same length and an
    /// attribute pair. Attributes for unknown traces are ignored.
    pub fn new<K, A>(
        traces: impl IntoIterator<Item = (K, Vec<f64>)>,
        attrs: impl IntoIterator<Item = (K, A)>,
    ) -> Result<Self, SweepError>
    where
        K: Into<String>,
        A: Into<TraceAttrs>,
    {
        let traces: IndexMap<String, Vec<f64>> =
            traces.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let mut given: IndexMap<String, TraceAttrs> =
            attrs.into_iter().map(|(k, a)| (k.into(), a.into())).collect();

        let expected = traces.values().next().ok_or(SweepError::Empty)?.len();
        let mut ordered = IndexMap::with_capacity(traces.len());
        for (name, data) in &traces {
            if data.len() != expected {
                return Err(SweepError::LengthMismatch {
                    name: name.clone(),
                    expected,
                    found: data.len(),
                });
            }
            let attr = given
                .swap_remove(name)
                .ok_or_else(|| SweepError::MissingAttrs(name.clone()))?;
            ordered.insert(name.clone(), attr);
        }

        Ok(Self {
            traces,
            attrs: ordered,
        })
    }

    /// Number of points per trace.
    pub fn len(&self) -> usize {
        self.traces.values().next().map_or(0, Vec::len)
    }

    /// True when the traces hold no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trace names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.traces.keys().map(String::as_str)
    }

    /// Data of a single trace.
    pub fn trace(&self, name: &str) -> Option<&[f64]> {
        self.traces.get(name).map(Vec::as_slice)
    }

    /// Attributes of a single trace.
    pub fn attrs(&self, name: &str) -> Option<&TraceAttrs> {
        self.attrs.get(name)
    }

    /// Yields `(name, x, y)` for every trace after the first, with the first trace
    /// as `x`.
    pub fn itercols(&self) -> impl Iterator<Item = (&str, &[f64], &[f64])> {
        let x = self
            .traces
            .first()
            .map(|(_, data)| data.as_slice())
            .unwrap_or_default();
        self.traces
            .iter()
            .skip(1)
            .map(move |(name, y)| (name.as_str(), x, y.as_slice()))
    }

    /// Axis label (`Label (unit)`) of every trace.
    pub fn get_axis_labels(&self) -> IndexMap<String, String> {
        self.attrs
            .iter()
            .map(|(name, attr)| (name.clone(), attr.axis_label()))
            .collect()
    }

    /// Writes the sweep as an attribute comment followed by a CSV table.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), SweepError> {
        let mut file = BufWriter::new(File::create(path.as_ref())?);
        let attrs = serde_json::to_string(&self.attrs)?;
        writeln!(file, "# {attrs}")?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(self.traces.keys())?;
        for row in 0..self.len() {
            writer.write_record(self.traces.values().map(|data| data[row].to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a sweep written by [`Sweep::write_csv`].
    ///
    /// Only the first line is treated as the attribute header; everything after it
    /// is plain CSV, so trace names may start with `#`.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self, SweepError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let (attr_line, table) = content.split_once('\n').unwrap_or((content.as_str(), ""));
        let attr_line = attr_line
            .trim_end_matches('\r')
            .strip_prefix("# ")
            .ok_or_else(|| SweepError::Malformed("missing attribute header".to_string()))?;
        let attrs: IndexMap<String, TraceAttrs> = serde_json::from_str(attr_line)?;

        let mut reader = csv::ReaderBuilder::new().from_reader(table.as_bytes());
        let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                let value = field.trim().parse::<f64>().map_err(|e| {
                    SweepError::Malformed(format!("bad value '{field}': {e}"))
                })?;
                column.push(value);
            }
        }

        Self::new(names.into_iter().zip(columns), attrs)
    }
}
