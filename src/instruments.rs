//! Instrument manager
//!
//! Tests receive an [`InstrumentManager`] during acquisition and look up the
//! instruments they need by ID. Instruments are shared behind `Arc` so a test can
//! hold on to one for the duration of a sweep.
//!
//! Virtual tests ignore the manager entirely; [`MockInstrument`] exists so the
//! execution path can be exercised with a populated manager as well.

use crate::error::{AppResult, AutosweepError};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capability: a connected instrument.
#[async_trait]
pub trait Instrument: Send + Sync {
    /// Unique instrument ID within the manager.
    fn id(&self) -> &str;

    /// Identification string (`*IDN?` style).
    async fn identify(&self) -> AppResult<String>;

    /// Releases the instrument. Idempotent.
    async fn close(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Named instruments available to a run.
#[derive(Default)]
pub struct InstrumentManager {
    instruments: IndexMap<String, Arc<dyn Instrument>>,
}

impl std::fmt::Debug for InstrumentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentManager")
            .field("instruments", &self.instruments.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InstrumentManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instrument under its own ID.
    ///
    /// # Errors
    /// Returns an error if the ID is already registered.
    pub fn register(&mut self, instrument: Arc<dyn Instrument>) -> AppResult<()> {
        let id = instrument.id().to_string();
        if self.instruments.contains_key(&id) {
            return Err(AutosweepError::Instrument(format!(
                "Instrument '{id}' is already registered"
            )));
        }
        tracing::debug!(instrument = %id, "Instrument registered");
        self.instruments.insert(id, instrument);
        Ok(())
    }

    /// Instrument registered under `id`.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Instrument>> {
        self.instruments.get(id).cloned()
    }

    /// IDs in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    /// Number of registered instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// True when no instrument is registered.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Closes every instrument, continuing past failures and returning the first.
    pub async fn close_all(&self) -> AppResult<()> {
        let mut first_error = None;
        for (id, instrument) in &self.instruments {
            if let Err(e) = instrument.close().await {
                tracing::warn!(instrument = %id, error = %e, "Failed to close instrument");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Instrument that answers identification queries and nothing else.
#[derive(Debug)]
pub struct MockInstrument {
    id: String,
    idn: String,
    closed: AtomicBool,
}

impl MockInstrument {
    /// Mock instrument answering under `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            idn: format!("autosweep,MockInstrument,{id},{}", env!("CARGO_PKG_VERSION")),
            id,
            closed: AtomicBool::new(false),
        }
    }

    /// True once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Instrument for MockInstrument {
    fn id(&self) -> &str {
        &self.id
    }

    async fn identify(&self) -> AppResult<String> {
        if self.is_closed() {
            return Err(AutosweepError::Instrument(format!(
                "Instrument '{}' is closed",
                self.id
            )));
        }
        Ok(self.idn.clone())
    }

    async fn close(&self) -> AppResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let mut manager = InstrumentManager::new();
        manager.register(Arc::new(MockInstrument::new("smu"))).unwrap();
        manager.register(Arc::new(MockInstrument::new("dmm"))).unwrap();

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.ids().collect::<Vec<_>>(), vec!["smu", "dmm"]);
        let smu = manager.get("smu").unwrap();
        assert!(smu.identify().await.unwrap().contains("MockInstrument,smu"));
        assert!(manager.get("scope").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut manager = InstrumentManager::new();
        manager.register(Arc::new(MockInstrument::new("smu"))).unwrap();
        let err = manager
            .register(Arc::new(MockInstrument::new("smu")))
            .unwrap_err();
        assert!(matches!(err, AutosweepError::Instrument(_)));
    }

    #[tokio::test]
    async fn test_close_all() {
        let smu = Arc::new(MockInstrument::new("smu"));
        let mut manager = InstrumentManager::new();
        manager.register(smu.clone()).unwrap();

        manager.close_all().await.unwrap();
        assert!(smu.is_closed());
        assert!(smu.identify().await.is_err());
    }
}
