use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::error::eval_error;
use crate::stdlib;
use hf_core::{Error, Result, Span, StructSchema, SymbolTable, Value};
use hf_lang::ast::{ConstDecl, FnDecl};

mod closures;
mod env;
mod eval_expr;
mod eval_stmt;
mod macros;
mod methods;
mod module;
mod operators;
mod resolve;

pub use closures::ScriptFunction;
use env::Env;

/// Target of the `tracing` events scripts emit through `println!` and `std::log`.
pub const SCRIPT_LOG_TARGET: &str = "hf::script";

const DEFAULT_MAX_STEPS: u64 = 1_000_000;
const DEFAULT_MAX_CALL_DEPTH: usize = 128;
/// How many steps pass between two deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;
/// Evaluation recurses on the native stack. Below this much headroom a new segment is
/// allocated, so deep scripts hit `max_call_depth` instead of overflowing.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

pub(crate) fn with_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}

/// Limits applied to one evaluation.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Expression steps allowed per evaluation, and per call into a script function from
    /// the host.
    pub max_steps: u64,
    /// Nested script calls allowed on one thread, counted across host re-entry.
    pub max_call_depth: usize,
    /// Applies while loading and evaluating; calls made later by the host ignore it.
    pub deadline: Option<Instant>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            deadline: None,
        }
    }
}

impl EvalOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }
}

pub(crate) type ModuleId = usize;
pub(crate) const ROOT_MODULE: ModuleId = 0;

/// What a name declared in a script module stands for.
#[derive(Clone)]
pub(crate) enum Binding {
    Fn(Arc<FnDef>),
    Const(Arc<ConstDef>),
    Struct(Arc<StructSchema>),
    Module(ModuleId),
    /// `use` imports resolve lazily, relative to the module that declares them.
    Import { path: Vec<String>, span: Span },
}

pub(crate) struct FnDef {
    pub decl: Arc<FnDecl>,
    pub module: ModuleId,
    pub qualified_name: String,
    pub signature: hf_core::Signature,
}

pub(crate) struct ConstDef {
    pub decl: ConstDecl,
    pub module: ModuleId,
}

pub(crate) struct ModuleData {
    pub path: Vec<String>,
    pub parent: Option<ModuleId>,
    pub items: HashMap<String, Binding>,
    pub globs: Vec<(Vec<String>, Span)>,
}

impl ModuleData {
    pub(crate) fn new(path: Vec<String>, parent: Option<ModuleId>) -> Self {
        Self {
            path,
            parent,
            items: HashMap::new(),
            globs: Vec::new(),
        }
    }

    /// `name` qualified with this module's path, as used for struct and function names.
    pub(crate) fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", self.path.join("::"), name)
        }
    }
}

/// A loaded script: its modules, the symbols it sees and the bindings created by its
/// top-level statements.
pub(crate) struct Program {
    pub origin: String,
    pub symbols: SymbolTable,
    pub options: EvalOptions,
    pub modules: Vec<ModuleData>,
    pub globals: RwLock<HashMap<String, Value>>,
}

impl Program {
    pub(crate) fn global(&self, name: &str) -> Option<Value> {
        let globals = self
            .globals
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        globals.get(name).cloned()
    }

    pub(crate) fn publish_globals(&self, bindings: impl IntoIterator<Item = (String, Value)>) {
        let mut globals = self
            .globals
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        globals.extend(bindings);
    }
}

/// Non-local exits threaded through evaluation alongside errors.
pub(crate) enum Flow {
    Break(Value),
    Continue,
    Return(Value),
    Error(Error),
}

impl From<Error> for Flow {
    fn from(err: Error) -> Self {
        Flow::Error(err)
    }
}

impl Flow {
    /// Resolve a flow that escaped a function body or the top level.
    pub(crate) fn into_result(self, span: Span) -> Result<Value> {
        match self {
            Flow::Return(value) => Ok(value),
            Flow::Break(_) => Err(eval_error("`break` outside of a loop", span)),
            Flow::Continue => Err(eval_error("`continue` outside of a loop", span)),
            Flow::Error(err) => Err(err),
        }
    }
}

pub(crate) type Eval<T> = std::result::Result<T, Flow>;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Holds one level of script call depth on the current thread until dropped.
pub(crate) struct DepthGuard(());

impl DepthGuard {
    pub(crate) fn enter(limit: usize, span: Span) -> Result<DepthGuard> {
        let depth = CALL_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            depth.set(next);
            next
        });
        let guard = DepthGuard(());
        if depth > limit {
            return Err(eval_error(
                format!("call depth limit of {limit} exceeded"),
                span,
            ));
        }
        Ok(guard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Step and time budget of one evaluation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub deadline: Option<Instant>,
}

impl Limits {
    fn for_load(options: &EvalOptions) -> Self {
        Self {
            max_steps: options.max_steps,
            max_call_depth: options.max_call_depth,
            deadline: options.deadline,
        }
    }

    /// A call made by the host after loading finished.
    pub(crate) fn for_host_call(options: &EvalOptions) -> Self {
        Self {
            deadline: None,
            ..Self::for_load(options)
        }
    }
}

/// Tree-walking evaluator. One instance runs a whole evaluation; calls into script
/// functions of the same program swap its environment and module instead of nesting a
/// new evaluator, so they share the step budget.
pub(crate) struct Evaluator<'p> {
    pub program: &'p Arc<Program>,
    pub module: ModuleId,
    pub env: Env,
    pub limits: Limits,
    steps: u64,
}

impl<'p> Evaluator<'p> {
    pub(crate) fn new(program: &'p Arc<Program>, module: ModuleId, env: Env, limits: Limits) -> Self {
        Self {
            program,
            module,
            env,
            limits,
            steps: 0,
        }
    }

    pub(crate) fn tick(&mut self, span: Span) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(eval_error(
                format!("step budget of {} exhausted", self.limits.max_steps),
                span,
            ));
        }
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 {
            self.check_deadline(span)?;
        }
        Ok(())
    }

    pub(crate) fn scope(&self) -> resolve::Scope<'p> {
        let program: &'p Program = self.program;
        resolve::Scope::new(&program.modules, &program.symbols)
    }

    pub(crate) fn check_deadline(&self, span: Span) -> Result<()> {
        match self.limits.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(eval_error("evaluation deadline exceeded", span))
            }
            _ => Ok(()),
        }
    }
}

/// Entry point for loading scripts against a fixed set of symbols.
#[derive(Debug, Clone)]
pub struct Interpreter {
    symbols: SymbolTable,
    options: EvalOptions,
}

impl Interpreter {
    pub fn new(symbols: &SymbolTable) -> Result<Self> {
        Self::with_options(symbols, EvalOptions::default())
    }

    /// Compose the base sets (`std`, `unsafe`, `syscall`, `unrestricted`, in that order)
    /// with `symbols`.
    pub fn with_options(symbols: &SymbolTable, options: EvalOptions) -> Result<Self> {
        let symbols = stdlib::base_symbols()?.merge(symbols)?;
        Ok(Self { symbols, options })
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Script> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_source(&source, &path.display().to_string())
    }

    /// Parse and load `source`; `origin` names it in errors.
    pub fn load_source(&self, source: &str, origin: &str) -> Result<Script> {
        let file = hf_lang::parse_file(source, origin)?;
        let (program, env) = module::load(file, origin, &self.symbols, &self.options)?;
        Ok(Script { program, env })
    }
}

/// A loaded script, ready to evaluate expressions in its root module.
pub struct Script {
    program: Arc<Program>,
    env: Env,
}

impl Script {
    pub fn origin(&self) -> &str {
        &self.program.origin
    }

    pub fn eval(&self, expr: &str) -> Result<Value> {
        let expr = hf_lang::parse_expression(expr, "<expr>")?;
        let limits = Limits::for_load(&self.program.options);
        let mut evaluator = Evaluator::new(&self.program, ROOT_MODULE, self.env.clone(), limits);
        evaluator.check_deadline(expr.span)?;
        match evaluator.eval_expr(&expr) {
            Ok(value) => Ok(value),
            Err(flow) => flow.into_result(expr.span),
        }
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("origin", &self.program.origin)
            .field("modules", &self.program.modules.len())
            .finish()
    }
}
