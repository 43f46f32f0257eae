//! The guarded apply pipeline: interpret, extract, resolve, redirect.

use crate::descriptor::{extract, hotfix_symbols, PatchDescriptor};
use crate::resolve::resolve;
use hf_core::redirect::{self, check_signature};
use hf_core::{Error, MethodSlot, PatchHandle, Result, SymbolTable};
use hf_interpret::{EvalOptions, Interpreter};
use serde::Serialize;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Interpreter limits for one apply or check.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub max_steps: u64,
    pub max_call_depth: usize,
    /// Wall-clock budget for loading the script and evaluating the expression.
    pub timeout: Option<Duration>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        let eval = EvalOptions::default();
        Self {
            max_steps: eval.max_steps,
            max_call_depth: eval.max_call_depth,
            timeout: None,
        }
    }
}

impl ApplyOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn eval_options(&self) -> EvalOptions {
        let options = EvalOptions {
            max_steps: self.max_steps,
            max_call_depth: self.max_call_depth,
            deadline: None,
        };
        match self.timeout {
            Some(timeout) => options.with_timeout(timeout),
            None => options,
        }
    }
}

/// Outcome of a dry run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchPlan {
    pub target: String,
    pub signature: String,
    pub replacement: String,
    pub currently_patched: bool,
}

/// Load `script_path`, evaluate `expr` to a `hotfix::FuncPatch` and redirect the named
/// method to its replacement.
pub fn apply_func(script_path: impl AsRef<Path>, expr: &str, symbols: &SymbolTable) -> Result<PatchHandle> {
    apply_func_with(script_path, expr, symbols, &ApplyOptions::default())
}

pub fn apply_func_with(
    script_path: impl AsRef<Path>,
    expr: &str,
    symbols: &SymbolTable,
    options: &ApplyOptions,
) -> Result<PatchHandle> {
    let script_path = script_path.as_ref();
    info!(script = %script_path.display(), expr, "applying hotfix");
    let outcome = guarded(|| {
        let (descriptor, slot) = prepare(script_path, expr, symbols, options)?;
        redirect::install(&slot, descriptor.replacement)
    });
    match &outcome {
        Ok(handle) => info!(id = handle.id(), target = %handle.target(), "hotfix applied"),
        Err(err) => warn!(kind = %err.kind(), script = %script_path.display(), expr, "hotfix failed: {err}"),
    }
    outcome
}

/// Everything [`apply_func`] does short of touching the slot.
pub fn check_func(script_path: impl AsRef<Path>, expr: &str, symbols: &SymbolTable) -> Result<PatchPlan> {
    check_func_with(script_path, expr, symbols, &ApplyOptions::default())
}

pub fn check_func_with(
    script_path: impl AsRef<Path>,
    expr: &str,
    symbols: &SymbolTable,
    options: &ApplyOptions,
) -> Result<PatchPlan> {
    let script_path = script_path.as_ref();
    guarded(|| {
        let (descriptor, slot) = prepare(script_path, expr, symbols, options)?;
        check_signature(&slot, descriptor.replacement.as_ref())?;
        Ok(PatchPlan {
            target: slot.qualified_name(),
            signature: slot.signature().to_string(),
            replacement: descriptor.replacement.name().to_string(),
            currently_patched: slot.is_patched(),
        })
    })
}

fn prepare(
    script_path: &Path,
    expr: &str,
    symbols: &SymbolTable,
    options: &ApplyOptions,
) -> Result<(PatchDescriptor, Arc<MethodSlot>)> {
    let symbols = hotfix_symbols()?.merge(symbols)?;
    let interpreter = Interpreter::with_options(&symbols, options.eval_options())?;
    let script = interpreter.load_file(script_path)?;
    let descriptor = extract(script.eval(expr)?)?;
    debug!(?descriptor, "patch descriptor extracted");
    let slot = resolve(&descriptor.owner, &descriptor.method)?;
    Ok((descriptor, slot))
}

/// Where and why the guarded closure panicked, captured inside the panic hook.
struct PanicReport {
    message: String,
    location: String,
    trace: String,
}

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a hook that records panics raised under [`guarded`] and defers every other
/// panic to the previously installed hook.
fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let report = PanicReport {
                message: payload_message(info.payload()),
                location: info
                    .location()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "<unknown location>".to_string()),
                trace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|last| *last.borrow_mut() = Some(report));
        }));
    });
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `f`, turning any panic into `PanicRecoveredError`.
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    install_panic_hook();
    LAST_PANIC.with(|last| last.borrow_mut().take());
    let outcome = {
        let _depth = DepthGuard::enter();
        panic::catch_unwind(AssertUnwindSafe(f))
    };
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let report = LAST_PANIC
                .with(|last| last.borrow_mut().take())
                .unwrap_or_else(|| PanicReport {
                    message: payload_message(&*payload),
                    location: "<unknown location>".to_string(),
                    trace: String::new(),
                });
            error!(location = %report.location, "recovered from panic: {}", report.message);
            Err(Error::PanicRecovered {
                message: format!("{} at {}", report.message, report.location),
                trace: report.trace,
            })
        }
    }
}
