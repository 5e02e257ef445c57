//! Test factory registry.
//!
//! Recipes name tests by string. The registry maps those names to factories so new
//! test types can be added without touching the executor.
//!
//! ```
//! use autosweep::registry::TestRegistry;
//!
//! let registry = TestRegistry::with_builtin();
//! assert!(registry.is_available("virtual"));
//! ```

use crate::error::{AppResult, AutosweepError};
use crate::test_case::{AbsTest, TestContext};
use crate::virtual_test::VirtualTest;
use indexmap::IndexMap;

type TestFactory = Box<dyn Fn(TestContext) -> Box<dyn AbsTest> + Send + Sync>;

/// Registry of test factories keyed by recipe name.
pub struct TestRegistry {
    factories: IndexMap<String, TestFactory>,
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for TestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRegistry")
            .field("tests", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl TestRegistry {
    /// Registry with no tests.
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Registry holding the tests shipped with the crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(VirtualTest::NAME, |ctx| Box::new(VirtualTest::from_context(ctx)));
        registry
    }

    /// Registers a factory, replacing any existing one of the same name.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(TestContext) -> Box<dyn AbsTest> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Builds the test registered under `name`.
    ///
    /// # Errors
    /// Returns `UnknownTest` if nothing is registered under `name`.
    pub fn create(&self, name: &str, ctx: TestContext) -> AppResult<Box<dyn AbsTest>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| AutosweepError::UnknownTest(name.to_string()))?;
        Ok(factory(ctx))
    }

    /// True if a factory is registered under `name`.
    pub fn is_available(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
