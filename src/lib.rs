//! # autosweep
//!
//! A small test-automation harness for hardware characterization. It runs virtual
//! or real device measurements, collects results, and renders simple reports.
//!
//! ## Crate Structure
//!
//! - **`recipe`**: `Recipe`, the JSON-backed description of which tests to run.
//! - **`sweep`**: `Sweep`, named measurement traces with (label, unit) attributes
//!   and CSV persistence.
//! - **`figure`**: `FigHandler`, line plots rendered to PNG.
//! - **`test_case`**: the `AbsTest` trait and `TestBase` with `save_data`/`load_data`.
//! - **`virtual_test`**: `VirtualTest`, a synthetic IV sweep that needs no hardware.
//! - **`instruments`**: `InstrumentManager` and the `Instrument` capability trait.
//! - **`results`**: `ResultsHold`, specs and report entries keyed by heading.
//! - **`registry`**: maps recipe test names to test factories.
//! - **`exec`**: `TestExec`, which runs a recipe end to end.
//! - **`report`**: HTML report rendering.
//! - **`metadata`**: `DUTInfo`, device-under-test metadata.
//! - **`config`** / **`logging`**: figment configuration and tracing setup.
//! - **`error`**: crate error types.

pub mod config;
pub mod error;
pub mod exec;
pub mod figure;
pub mod instruments;
pub mod logging;
pub mod metadata;
pub mod recipe;
pub mod registry;
pub mod report;
pub mod results;
pub mod sweep;
pub mod test_case;

pub use error::{AppResult, AutosweepError};
pub use exec::{RunSummary, TestExec};
pub use metadata::DUTInfo;
pub use recipe::Recipe;
pub use results::ResultsHold;
pub use sweep::Sweep;
pub use test_case::{AbsTest, TestBase};
pub use virtual_test::VirtualTest;
