//! Custom error types for the harness.
//!
//! This module defines the primary error type, `AutosweepError`, together with the
//! narrower error enums owned by the data types (`RecipeError`, `SweepError`,
//! `FigureError`). Using the `thiserror` crate, each layer gets a consistent way to
//! describe what went wrong, and `#[from]` lets the `?` operator lift a narrow error
//! into the crate-wide one.
//!
//! ## Error Hierarchy
//!
//! - **`Recipe`**: the recipe mapping is missing `tests`, has the wrong shape, or its
//!   JSON file could not be read or written.
//! - **`Sweep`**: traces of mismatched length, missing attributes, or a sweep file
//!   that could not be parsed.
//! - **`Figure`**: a figure could not be rendered or encoded as PNG.
//! - **`UnknownTest`**: a recipe names a test type nothing registered.
//! - **`MissingHeading`** / **`MissingSweep`**: analysis ran without the inputs it
//!   needs.
//! - **`Configuration`**: semantic configuration errors caught by validation.
//! - **`Io`** / **`Json`**: wrapped I/O and serialization failures.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, AutosweepError>;

/// Errors raised by [`crate::recipe::Recipe`].
#[derive(Error, Debug)]
pub enum RecipeError {
    /// A required key is absent from the recipe mapping.
    #[error("Recipe has no '{0}' key")]
    MissingKey(String),

    /// A value has the wrong JSON shape, e.g. `tests` is not a list.
    #[error("Recipe value '{key}' is not a list: {found}")]
    NotASequence {
        /// Where in the recipe the bad value lives.
        key: String,
        /// Compact rendering of the offending value.
        found: String,
    },

    /// The recipe file is valid JSON but not an object.
    #[error("Recipe file '{0}' does not contain a JSON object")]
    NotAnObject(PathBuf),

    /// Reading or writing the recipe file failed.
    #[error("Recipe I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The recipe could not be (de)serialized.
    #[error("Recipe serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while building, writing, or reading a [`crate::sweep::Sweep`].
#[derive(Error, Debug)]
pub enum SweepError {
    /// The sweep has no traces.
    #[error("Sweep must contain at least one trace")]
    Empty,

    /// A trace differs in length from the first trace.
    #[error("Trace '{name}' has {found} points, expected {expected}")]
    LengthMismatch {
        /// Trace name.
        name: String,
        /// Length of the first trace.
        expected: usize,
        /// Length of this trace.
        found: usize,
    },

    /// A trace has no attribute pair.
    #[error("Trace '{0}' has no (label, unit) attribute")]
    MissingAttrs(String),

    /// The file or key does not follow the sweep layout.
    #[error("Sweep file is malformed: {0}")]
    Malformed(String),

    /// CSV reading or writing failed.
    #[error("Sweep CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Sweep file I/O failed.
    #[error("Sweep I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The attribute header could not be (de)serialized.
    #[error("Sweep attribute serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by [`crate::figure::FigHandler::save_fig`].
#[derive(Error, Debug)]
pub enum FigureError {
    /// Nothing was plotted.
    #[error("Figure has no plotted lines")]
    Empty,

    /// A line has x and y of different lengths.
    #[error("Line '{0}' has mismatched x/y lengths")]
    LengthMismatch(String),

    /// A line contains NaN or infinite values.
    #[error("Line '{0}' contains non-finite values")]
    NonFinite(String),

    /// Writing the figure file failed.
    #[error("Figure I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image encoder failed.
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Primary error type for the harness.
#[derive(Error, Debug)]
pub enum AutosweepError {
    /// Recipe problem.
    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),

    /// Sweep problem.
    #[error("Sweep error: {0}")]
    Sweep(#[from] SweepError),

    /// Figure problem.
    #[error("Figure error: {0}")]
    Figure(#[from] FigureError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration or device metadata failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// A recipe names a test nothing registered.
    #[error("No test registered under '{0}'")]
    UnknownTest(String),

    /// A recipe entry cannot be turned into a test.
    #[error("Recipe entry {index} is invalid: {reason}")]
    InvalidRecipeEntry {
        /// Position in `recipe["tests"]`.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Analysis was given no report heading.
    #[error("Test '{0}' was given no report headings")]
    MissingHeading(String),

    /// Analysis asked for a sweep that was never loaded.
    #[error("Sweep '{0}' has not been acquired or loaded")]
    MissingSweep(String),

    /// An instrument refused an operation.
    #[error("Instrument error: {0}")]
    Instrument(String),

    /// Filesystem error during a run.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed during a run.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for AutosweepError {
    fn from(value: figment::Error) -> Self {
        Self::Config(Box::new(value))
    }
}
