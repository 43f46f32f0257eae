//! Code redirection.
//!
//! Installing a patch allocates a fresh entry for the replacement and publishes it into
//! the method slot with one atomic swap. Concurrent callers see either the old or the new
//! entry. Installs and restores across the whole process are serialized by [`PATCH_LOCK`].

use crate::error::{Error, Result};
use crate::method::{EntryAddr, MethodEntry, MethodSlot};
use crate::value::{Callable, Function};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

static PATCH_LOCK: Mutex<()> = Mutex::new(());
static NEXT_PATCH_ID: AtomicU64 = AtomicU64::new(1);

fn lock() -> MutexGuard<'static, ()> {
    PATCH_LOCK.lock().unwrap_or_else(|poisoned| {
        // the guarded state lives in the slots, which are only changed by atomic swaps
        warn!("patch lock poisoned by an earlier panic, recovering");
        poisoned.into_inner()
    })
}

/// Proof that a patch is installed. Dropping it leaves the patch live.
///
/// Restoring does not reclaim the installed entry, so memory grows with the number of
/// installs over the life of the process.
#[must_use = "dropping the handle leaves the patch installed with no way to restore it"]
pub struct PatchHandle {
    id: u64,
    slot: Arc<MethodSlot>,
    installed: &'static MethodEntry,
    replaced: &'static MethodEntry,
    generation: u64,
}

impl PatchHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Qualified name of the patched method.
    pub fn target(&self) -> String {
        self.slot.qualified_name()
    }

    pub fn slot(&self) -> &Arc<MethodSlot> {
        &self.slot
    }

    pub fn installed_addr(&self) -> EntryAddr {
        EntryAddr::of(self.installed)
    }

    /// Entry that was live right before this patch.
    pub fn replaced_addr(&self) -> EntryAddr {
        EntryAddr::of(self.replaced)
    }

    /// False once a later install or a restore has touched the slot.
    pub fn is_live(&self) -> bool {
        self.slot.generation() == self.generation
    }

    /// Put the pristine implementation back.
    ///
    /// Fails with `RedirectionError` when the patch was superseded by a later install,
    /// in which case the slot is left alone.
    pub fn restore(self) -> Result<()> {
        let _guard = lock();
        let current = self.slot.generation();
        if current != self.generation {
            return Err(Error::Redirection(format!(
                "patch #{} on `{}` is no longer live (slot generation {} != {})",
                self.id,
                self.slot.qualified_name(),
                current,
                self.generation
            )));
        }
        let pristine = self.slot.pristine();
        let removed = self.slot.publish(pristine);
        self.slot.bump_generation();
        info!(
            id = self.id,
            method = %self.slot.qualified_name(),
            from = %EntryAddr::of(removed),
            to = %EntryAddr::of(pristine),
            "restored method"
        );
        Ok(())
    }
}

impl fmt::Debug for PatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchHandle")
            .field("id", &self.id)
            .field("target", &self.target())
            .field("installed", &self.installed_addr())
            .field("replaced", &self.replaced_addr())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Fails with `SignatureMismatchError` unless `replacement` declares exactly the slot's
/// signature.
pub fn check_signature(slot: &MethodSlot, replacement: &dyn Function) -> Result<()> {
    match replacement.signature() {
        Some(found) if found == slot.signature() => Ok(()),
        found => Err(Error::SignatureMismatch {
            target: slot.qualified_name(),
            expected: slot.signature().clone(),
            found: found
                .map(|sig| sig.to_string())
                .unwrap_or_else(|| "untyped callable".to_string()),
        }),
    }
}

/// Retarget `slot` to `replacement`.
///
/// The replacement is moved into a new entry that stays allocated for the rest of the
/// process, even after a restore or a later install.
pub fn install(slot: &Arc<MethodSlot>, replacement: Callable) -> Result<PatchHandle> {
    let _guard = lock();
    if slot.is_sealed() {
        return Err(Error::Redirection(format!(
            "`{}` is sealed and cannot be redirected",
            slot.qualified_name()
        )));
    }
    check_signature(slot, replacement.as_ref())?;

    let installed = MethodEntry::leak(replacement);
    let replaced = slot.publish(installed);
    let generation = slot.bump_generation();
    let id = NEXT_PATCH_ID.fetch_add(1, Ordering::Relaxed);
    info!(
        id,
        method = %slot.qualified_name(),
        from = %EntryAddr::of(replaced),
        to = %EntryAddr::of(installed),
        "installed method patch"
    );
    Ok(PatchHandle {
        id,
        slot: slot.clone(),
        installed,
        replaced,
        generation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::TypeDescriptor;
    use crate::ty::Ty;
    use crate::value::{NativeFunction, Value};

    struct Greeter;

    fn greeter() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder::<Greeter>("demo::Greeter")
            .method("greet", vec![], Ty::Str, |_, _| Ok(Value::from("hi")))
            .sealed_method("id", vec![], Ty::Str, |_, _| Ok(Value::from("greeter")))
            .build()
    }

    fn replacement(text: &'static str) -> Callable {
        Arc::new(NativeFunction::new(
            "replacement",
            vec![Ty::named("demo::Greeter")],
            Ty::Str,
            move |_| Ok(Value::from(text)),
        ))
    }

    #[test]
    fn sealed_slots_are_rejected() {
        let ty = greeter();
        let slot = ty.method("id").cloned().unwrap();
        let err = install(&slot, replacement("x")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Redirection);
        assert!(!slot.is_patched());
    }

    #[test]
    fn restore_returns_to_pristine_entry() {
        let ty = greeter();
        let slot = ty.method("greet").cloned().unwrap();
        let pristine = slot.entry_addr();
        let handle = install(&slot, replacement("patched")).unwrap();
        assert_eq!(handle.replaced_addr(), pristine);
        assert_eq!(slot.entry_addr(), handle.installed_addr());
        handle.restore().unwrap();
        assert_eq!(slot.entry_addr(), pristine);
    }

    #[test]
    fn every_install_gets_a_fresh_entry() {
        let ty = greeter();
        let slot = ty.method("greet").cloned().unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let handle = install(&slot, replacement("patched")).unwrap();
            assert!(seen.insert(handle.installed_addr()));
            handle.restore().unwrap();
        }
        assert!(!seen.contains(&slot.entry_addr()));
    }
}
