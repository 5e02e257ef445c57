//! Test recipes.
//!
//! A [`Recipe`] wraps a plain JSON mapping describing the tests to run. It does not
//! validate the mapping on construction; shape problems surface only when a caller
//! asks for something the mapping cannot provide (see [`Recipe::tests`]).
//!
//! ```json
//! {
//!   "tests": [
//!     ["virtual", "IV sweep"],
//!     ["virtual", "IV sweep (repeat)", "Summary"]
//!   ]
//! }
//! ```

use crate::error::RecipeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Key holding the list of test tuples.
pub const TESTS_KEY: &str = "tests";

/// A serializable configuration describing a sequence of tests.
///
/// Two recipes are equal iff their underlying mappings are equal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe {
    recipe: Map<String, Value>,
}

impl Recipe {
    /// Wraps `recipe` without checking its shape.
    pub fn new(recipe: Map<String, Value>) -> Self {
        Self { recipe }
    }

    /// Builds a recipe from a mapping.
    pub fn from_dict(data: Map<String, Value>) -> Self {
        Self::new(data)
    }

    /// Returns the stored mapping as-is.
    pub fn to_dict(&self) -> &Map<String, Value> {
        &self.recipe
    }

    /// Consumes the recipe and returns the mapping.
    pub fn into_dict(self) -> Map<String, Value> {
        self.recipe
    }

    /// Writes the mapping verbatim as pretty-printed JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<(), RecipeError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.recipe)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), "Recipe written");
        Ok(())
    }

    /// Reads a recipe previously written with [`Recipe::to_json`] (or by hand).
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, RecipeError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        match serde_json::from_reader(reader)? {
            Value::Object(map) => Ok(Self::new(map)),
            _ => Err(RecipeError::NotAnObject(path.to_path_buf())),
        }
    }

    /// Lazily yields one tuple per entry of `recipe["tests"]`.
    ///
    /// Fails immediately when the key is absent or is not a list. An entry that is
    /// not itself a list is reported when the iterator reaches it. Calling `tests()`
    /// again restarts from the first entry.
    pub fn tests(&self) -> Result<RecipeTests<'_>, RecipeError> {
        let tests = self
            .recipe
            .get(TESTS_KEY)
            .ok_or_else(|| RecipeError::MissingKey(TESTS_KEY.to_string()))?;
        let entries = tests.as_array().ok_or_else(|| RecipeError::NotASequence {
            key: TESTS_KEY.to_string(),
            found: tests.to_string(),
        })?;
        Ok(RecipeTests {
            inner: entries.iter().enumerate(),
        })
    }
}

impl From<Map<String, Value>> for Recipe {
    fn from(value: Map<String, Value>) -> Self {
        Self::new(value)
    }
}

/// Iterator returned by [`Recipe::tests`].
#[derive(Debug, Clone)]
pub struct RecipeTests<'a> {
    inner: std::iter::Enumerate<std::slice::Iter<'a, Value>>,
}

impl<'a> Iterator for RecipeTests<'a> {
    type Item = Result<TestTuple<'a>, RecipeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, entry) = self.inner.next()?;
        Some(match entry.as_array() {
            Some(values) => Ok(TestTuple { values }),
            None => Err(RecipeError::NotASequence {
                key: format!("{TESTS_KEY}[{index}]"),
                found: entry.to_string(),
            }),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for RecipeTests<'_> {}

/// One entry of `recipe["tests"]`, borrowed from the recipe.
///
/// By convention the first element names the test type and any following string
/// elements are report headings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestTuple<'a> {
    values: &'a [Value],
}

impl<'a> TestTuple<'a> {
    /// All elements of the tuple.
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for an empty entry.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Element at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    /// The test type name, when the first element is a string.
    pub fn test_name(&self) -> Option<&'a str> {
        self.values.first().and_then(Value::as_str)
    }

    /// String elements after the first.
    pub fn headings(&self) -> Vec<String> {
        self.values
            .iter()
            .skip(1)
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }
}

impl PartialEq<[Value]> for TestTuple<'_> {
    fn eq(&self, other: &[Value]) -> bool {
        self.values == other
    }
}
