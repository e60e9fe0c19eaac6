//! Optimistic concurrency control for versioned records.
//!
//! A caller presents the version it last read. The guard probes the record,
//! applies the caller's mutation to a copy and asks the store for a
//! conditional write that only lands if the stored version is unchanged.
//! Conflicts are reported, never retried here.

use marquee_core::StoreError;
use marquee_core::model::Versioned;
use marquee_core::store::VersionedStore;
use std::marker::PhantomData;
use std::sync::Arc;

/// Result of a compare-and-swap attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome<R> {
    /// The write landed; the record carries its new version.
    Committed(R),
    /// Someone else changed the record since the caller read it.
    Conflict,
    /// No record with this id.
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError<E> {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The mutation refused to produce a new state.
    #[error("mutation rejected")]
    Rejected(E),
}

pub struct ConcurrencyGuard<R, S: ?Sized> {
    store: Arc<S>,
    _record: PhantomData<fn() -> R>,
}

impl<R, S: ?Sized> Clone for ConcurrencyGuard<R, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<R, S> ConcurrencyGuard<R, S>
where
    R: Versioned + Send + Sync + 'static,
    S: VersionedStore<R> + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Apply `mutate` to record `id` if its version is still `expected_version`.
    ///
    /// The record is probed first: absent is `NotFound`, a different version
    /// is `Conflict` without calling `mutate`. A conditional write that then
    /// matches no row is also `Conflict`.
    pub async fn compare_and_swap<E, F>(
        &self,
        id: i64,
        expected_version: i32,
        mutate: F,
    ) -> Result<CasOutcome<R>, GuardError<E>>
    where
        F: FnOnce(&mut R) -> Result<(), E>,
    {
        let Some(mut record) = self.store.get(id).await? else {
            return Ok(CasOutcome::NotFound);
        };
        if record.version() != expected_version {
            tracing::debug!(
                id,
                expected_version,
                current_version = record.version(),
                "stale version"
            );
            return Ok(CasOutcome::Conflict);
        }

        mutate(&mut record).map_err(GuardError::Rejected)?;

        match self.store.conditional_update(&record, expected_version).await? {
            Some(new_version) => {
                record.set_version(new_version);
                Ok(CasOutcome::Committed(record))
            }
            None => {
                tracing::debug!(id, expected_version, "conditional write matched no row");
                Ok(CasOutcome::Conflict)
            }
        }
    }
}
