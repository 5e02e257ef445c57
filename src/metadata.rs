//! Device-under-test metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Identifies the device a run measured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DUTInfo {
    /// Serial number; also names the run's output folder.
    pub serial_number: String,
    /// Part or model number.
    pub part_number: String,
    /// Free-form user fields (wafer, lot, temperature, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    /// Version of the harness that produced the data.
    pub software_version: String,
}

impl Default for DUTInfo {
    fn default() -> Self {
        Self {
            serial_number: "unknown".to_string(),
            part_number: String::new(),
            extra: BTreeMap::new(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl DUTInfo {
    /// Metadata for the given serial number.
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            ..Self::default()
        }
    }

    /// Validates the metadata.
    ///
    /// The serial number becomes a directory name, so it must be non-empty and free
    /// of path separators.
    pub fn validate(&self) -> Result<(), String> {
        let serial = self.serial_number.trim();
        if serial.is_empty() {
            return Err("Serial number cannot be empty.".to_string());
        }
        if serial.contains(&['/', '\\'][..]) || serial == "." || serial == ".." {
            return Err(format!(
                "Serial number '{}' cannot be used as a folder name.",
                self.serial_number
            ));
        }
        Ok(())
    }
}

/// A builder for constructing `DUTInfo` instances.
#[derive(Default)]
pub struct DUTInfoBuilder {
    inner: DUTInfo,
}

impl DUTInfoBuilder {
    /// Builder starting from `DUTInfo::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the serial number.
    pub fn serial_number(mut self, serial: &str) -> Self {
        self.inner.serial_number = serial.to_string();
        self
    }

    /// Sets the part number.
    pub fn part_number(mut self, part: &str) -> Self {
        self.inner.part_number = part.to_string();
        self
    }

    /// Adds a free-form field.
    pub fn extra(mut self, key: &str, value: Value) -> Self {
        self.inner.extra.insert(key.to_string(), value);
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> DUTInfo {
        self.inner
    }
}
