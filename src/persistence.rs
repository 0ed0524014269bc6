//! Persistence
//!
//! Snapshots are written as a versioned JSON envelope:
//!
//! ```json
//! { "version": 1, "state": { ... } }
//! ```
//!
//! Restoring also accepts the bare state object written by earlier storefront
//! builds, which had no envelope. Anything that fails to decode or validate is
//! treated as absent, so a corrupt value never blocks start-up.

use std::{fmt, marker::PhantomData, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    storage::{Storage, StorageError},
    store::Observer,
};

/// Envelope version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised while saving or loading a snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The stored text is not valid JSON for the expected shape.
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope carries a version this build does not understand.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u64),

    /// The snapshot decoded but breaks an invariant of the state.
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

/// State that can be written to and restored from [`Storage`].
pub trait Persisted: Serialize + DeserializeOwned + Default {
    /// Fixed storage key for this state.
    const KEY: &'static str;

    /// Check a freshly decoded value and rebuild anything derived from it.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Invalid`] if the value breaks an invariant.
    fn validate(self) -> Result<Self, PersistenceError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, S> {
    version: u32,
    state: &'a S,
}

#[derive(Deserialize)]
struct Envelope<S> {
    state: S,
}

/// Serialize `state` and write it under its key.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if serialization or the write fails.
pub fn save<S: Persisted>(storage: &dyn Storage, state: &S) -> Result<(), PersistenceError> {
    let json = serde_json::to_string(&EnvelopeRef {
        version: SNAPSHOT_VERSION,
        state,
    })?;

    storage.set(S::KEY, &json)?;

    Ok(())
}

/// Read, decode and validate the snapshot under `S::KEY`.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if the read fails or the stored value is malformed.
pub fn load<S: Persisted>(storage: &dyn Storage) -> Result<Option<S>, PersistenceError> {
    let Some(raw) = storage.get(S::KEY)? else {
        return Ok(None);
    };

    decode::<S>(&raw).map(Some)
}

/// Decode a stored snapshot, enveloped or bare.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if the text is malformed, the version is
/// unknown, or validation fails.
pub fn decode<S: Persisted>(raw: &str) -> Result<S, PersistenceError> {
    let value: Value = serde_json::from_str(raw)?;

    let state = match value.get("version") {
        Some(version) => {
            let version = version
                .as_u64()
                .ok_or_else(|| PersistenceError::Invalid(format!("version {version}")))?;

            if version != u64::from(SNAPSHOT_VERSION) {
                return Err(PersistenceError::UnsupportedVersion(version));
            }

            serde_json::from_value::<Envelope<S>>(value)?.state
        }
        None => serde_json::from_value::<S>(value)?,
    };

    state.validate()
}

/// Load the snapshot under `S::KEY`, falling back to `S::default()` when it is
/// missing or unusable.
pub fn restore<S: Persisted>(storage: &dyn Storage) -> S {
    match load::<S>(storage) {
        Ok(Some(state)) => {
            debug!(key = S::KEY, "restored snapshot");
            state
        }
        Ok(None) => S::default(),
        Err(error) => {
            warn!(key = S::KEY, %error, "discarding unusable snapshot");
            S::default()
        }
    }
}

/// Observer that writes every snapshot to storage.
///
/// Write failures are logged and otherwise ignored: the in-memory snapshot
/// stays authoritative for the session.
pub struct PersistenceObserver<S> {
    storage: Arc<dyn Storage>,
    failures: u64,
    _state: PhantomData<fn(&S)>,
}

impl<S> PersistenceObserver<S> {
    /// Persist into `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            failures: 0,
            _state: PhantomData,
        }
    }

    /// Number of writes that have failed so far.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl<S: Persisted> Observer<S> for PersistenceObserver<S> {
    fn on_change(&mut self, snapshot: &S) {
        if let Err(error) = save(self.storage.as_ref(), snapshot) {
            self.failures += 1;
            warn!(key = S::KEY, %error, failures = self.failures, "failed to persist snapshot");
        }
    }
}

impl<S> fmt::Debug for PersistenceObserver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceObserver")
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}
