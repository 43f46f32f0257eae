//! Bookkeeping for live patches, so an operator can list and revert them by id.

use dashmap::DashMap;
use hf_core::{Error, PatchHandle, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchRecord {
    pub id: u64,
    pub target: String,
    pub script: PathBuf,
    pub expr: String,
    /// Milliseconds since the Unix epoch.
    pub applied_at: u64,
}

struct LivePatch {
    handle: PatchHandle,
    record: PatchRecord,
}

/// Concurrent map of patch id to its handle.
#[derive(Default)]
pub struct PatchLedger {
    patches: DashMap<u64, LivePatch>,
}

impl PatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `handle`. Entries for the same method whose handles are no longer
    /// live are dropped.
    ///
    /// Installs and records may interleave, so a handle can arrive after a later install
    /// already superseded it. Such a handle is rejected and the live entry is kept.
    pub fn record(
        &self,
        handle: PatchHandle,
        script: impl Into<PathBuf>,
        expr: impl Into<String>,
    ) -> Result<PatchRecord> {
        if !handle.is_live() {
            return Err(Error::Redirection(format!(
                "patch #{} on `{}` was superseded before it was recorded",
                handle.id(),
                handle.target()
            )));
        }
        let applied_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        let record = PatchRecord {
            id: handle.id(),
            target: handle.target(),
            script: script.into(),
            expr: expr.into(),
            applied_at,
        };
        // generations only grow, so a handle that is stale now stays stale
        self.patches
            .retain(|_, live| live.handle.is_live() || !Arc::ptr_eq(live.handle.slot(), handle.slot()));
        self.patches.insert(
            record.id,
            LivePatch {
                handle,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    /// Live patches, oldest first.
    pub fn list(&self) -> Vec<PatchRecord> {
        let mut records: Vec<_> = self.patches.iter().map(|live| live.record.clone()).collect();
        records.sort_by_key(|record| record.id);
        records
    }

    pub fn get(&self, id: u64) -> Option<PatchRecord> {
        self.patches.get(&id).map(|live| live.record.clone())
    }

    /// Restore the method patched by `id` to its original implementation.
    pub fn revert(&self, id: u64) -> Result<PatchRecord> {
        let Some((_, live)) = self.patches.remove(&id) else {
            return Err(Error::Redirection(format!("no live patch with id {id}")));
        };
        live.handle.restore()?;
        info!(id, target = %live.record.target, "patch reverted");
        Ok(live.record)
    }

    /// Revert every live patch; returns how many were reverted. The first failure is
    /// reported after all others were attempted.
    pub fn revert_all(&self) -> Result<usize> {
        let ids: Vec<u64> = self.patches.iter().map(|live| *live.key()).collect();
        let mut reverted = 0;
        let mut first_err = None;
        for id in ids {
            match self.revert(id) {
                Ok(_) => reverted += 1,
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(reverted),
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

impl std::fmt::Debug for PatchLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.list()).finish()
    }
}
