//! Per-type method tables.
//!
//! Every patchable method owns a [`MethodSlot`]: a single pointer-sized cell naming the
//! entry that calls go through. Entries are allocated once and never freed, so a caller
//! that loaded an entry keeps a valid reference even if the slot is retargeted while the
//! call is in flight. Only [`crate::redirect`] writes to a slot.

use crate::error::{Error, Result};
use crate::ty::{Signature, Ty};
use crate::value::{Args, Callable, Function, HostValue, NativeFunction, Value};
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::Arc;

/// Immutable code entry a slot points at.
pub(crate) struct MethodEntry {
    pub(crate) callable: Callable,
}

impl MethodEntry {
    /// Entries are never freed: a caller may still be running one it loaded before a
    /// swap. Each install costs one entry plus whatever its callable keeps alive.
    pub(crate) fn leak(callable: Callable) -> &'static MethodEntry {
        Box::leak(Box::new(MethodEntry { callable }))
    }
}

/// Address of a method entry, for identity checks and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryAddr(usize);

impl EntryAddr {
    pub(crate) fn of(entry: &MethodEntry) -> EntryAddr {
        EntryAddr(entry as *const MethodEntry as usize)
    }
}

impl fmt::Display for EntryAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

pub struct MethodSlot {
    owner: String,
    name: String,
    signature: Signature,
    /// Always points at a leaked `MethodEntry`.
    entry: AtomicPtr<MethodEntry>,
    pristine: &'static MethodEntry,
    generation: AtomicU64,
    sealed: bool,
}

impl MethodSlot {
    fn new(owner: &str, name: &str, signature: Signature, callable: Callable, sealed: bool) -> Self {
        let pristine = MethodEntry::leak(callable);
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            signature,
            entry: AtomicPtr::new(pristine as *const MethodEntry as *mut MethodEntry),
            pristine,
            generation: AtomicU64::new(0),
            sealed,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.owner, self.name)
    }

    /// Declared signature, receiver first.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn current(&self) -> &'static MethodEntry {
        let ptr = self.entry.load(Ordering::Acquire);
        // SAFETY: the cell only ever holds pointers obtained from `MethodEntry::leak`,
        // which are valid for the rest of the process.
        unsafe { &*ptr }
    }

    /// Invoke whatever implementation is live right now.
    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        let entry = self.current();
        entry.callable.call(args)
    }

    /// Invoke the implementation the slot was built with, bypassing any patch.
    pub fn call_original(&self, args: Vec<Value>) -> Result<Value> {
        self.pristine.callable.call(args)
    }

    pub fn entry_addr(&self) -> EntryAddr {
        EntryAddr::of(self.current())
    }

    pub fn pristine_addr(&self) -> EntryAddr {
        EntryAddr::of(self.pristine)
    }

    pub fn is_patched(&self) -> bool {
        self.entry_addr() != self.pristine_addr()
    }

    /// Number of completed installs and restores on this slot.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn current_callable(&self) -> Callable {
        self.current().callable.clone()
    }

    /// A callable that dispatches through this slot, observing later patches.
    pub fn dispatcher(self: &Arc<Self>) -> Callable {
        Arc::new(SlotCallable {
            slot: self.clone(),
            name: self.qualified_name(),
            original: false,
        })
    }

    /// A callable bound to the pristine implementation.
    pub fn original(self: &Arc<Self>) -> Callable {
        Arc::new(SlotCallable {
            slot: self.clone(),
            name: format!("{} (original)", self.qualified_name()),
            original: true,
        })
    }

    pub(crate) fn pristine(&self) -> &'static MethodEntry {
        self.pristine
    }

    /// Store `entry` with a single atomic swap and return the entry it replaced.
    pub(crate) fn publish(&self, entry: &'static MethodEntry) -> &'static MethodEntry {
        let previous = self
            .entry
            .swap(entry as *const MethodEntry as *mut MethodEntry, Ordering::AcqRel);
        // SAFETY: see `current`.
        unsafe { &*previous }
    }

    pub(crate) fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl fmt::Debug for MethodSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSlot")
            .field("method", &self.qualified_name())
            .field("signature", &self.signature.to_string())
            .field("entry", &self.entry_addr())
            .field("generation", &self.generation())
            .finish()
    }
}

struct SlotCallable {
    slot: Arc<MethodSlot>,
    name: String,
    original: bool,
}

impl Function for SlotCallable {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> Option<&Signature> {
        Some(self.slot.signature())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value> {
        if self.original {
            self.slot.call_original(args)
        } else {
            self.slot.call(args)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type FieldGetter = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Value> + Send + Sync>;

/// Reflection data for a host type: its qualified name, its patchable methods and the
/// fields scripts may read.
pub struct TypeDescriptor {
    name: String,
    type_id: TypeId,
    methods: BTreeMap<String, Arc<MethodSlot>>,
    fields: BTreeMap<String, FieldGetter>,
}

impl TypeDescriptor {
    /// Start describing host type `T` under a qualified name such as `handler::HttpSvc`.
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            name: name.into(),
            methods: Vec::new(),
            fields: BTreeMap::new(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last path segment of the name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodSlot>> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodSlot>> {
        self.methods.values()
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn field(&self, value: &HostValue, name: &str) -> Option<Value> {
        let getter = self.fields.get(name)?;
        getter(value.object.as_ref())
    }

    /// Wrap a host object so it can be handed to scripts.
    pub fn instance<T: Any + Send + Sync>(self: &Arc<Self>, object: Arc<T>) -> Result<Value> {
        if TypeId::of::<T>() != self.type_id {
            return Err(Error::eval(format!(
                "`{}` does not describe Rust type `{}`",
                self.name,
                std::any::type_name::<T>()
            )));
        }
        Ok(Value::Host(HostValue {
            ty: self.clone(),
            object,
        }))
    }

    /// Call a method through its slot.
    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        match self.methods.get(method) {
            Some(slot) => slot.call(args),
            None => Err(Error::MethodNotFound {
                owner: self.name.clone(),
                method: method.to_string(),
                available: None,
            }),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("methods", &self.method_names())
            .field("fields", &self.field_names())
            .finish()
    }
}

struct PendingMethod {
    name: String,
    params: Vec<Ty>,
    ret: Ty,
    func: Box<dyn Fn(Args) -> Result<Value> + Send + Sync>,
    sealed: bool,
}

pub struct TypeDescriptorBuilder<T> {
    name: String,
    methods: Vec<PendingMethod>,
    fields: BTreeMap<String, FieldGetter>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeDescriptorBuilder<T> {
    /// Register a patchable method. `params` excludes the receiver, which is prepended to
    /// the slot signature.
    pub fn method<F>(self, name: &str, params: Vec<Ty>, ret: Ty, func: F) -> Self
    where
        F: Fn(Arc<T>, Args) -> Result<Value> + Send + Sync + 'static,
    {
        self.push_method(name, params, ret, func, false)
    }

    /// Register a method whose slot refuses redirection.
    pub fn sealed_method<F>(self, name: &str, params: Vec<Ty>, ret: Ty, func: F) -> Self
    where
        F: Fn(Arc<T>, Args) -> Result<Value> + Send + Sync + 'static,
    {
        self.push_method(name, params, ret, func, true)
    }

    fn push_method<F>(mut self, name: &str, params: Vec<Ty>, ret: Ty, func: F, sealed: bool) -> Self
    where
        F: Fn(Arc<T>, Args) -> Result<Value> + Send + Sync + 'static,
    {
        let func = move |args: Args| {
            let receiver = args.host::<T>(0)?;
            func(receiver, args.skip(1))
        };
        self.methods.push(PendingMethod {
            name: name.to_string(),
            params,
            ret,
            func: Box::new(func),
            sealed,
        });
        self
    }

    /// Expose a read-only field to scripts.
    pub fn field<F>(mut self, name: &str, getter: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let getter = move |object: &(dyn Any + Send + Sync)| object.downcast_ref::<T>().map(&getter);
        self.fields.insert(name.to_string(), Box::new(getter));
        self
    }

    pub fn build(self) -> Arc<TypeDescriptor> {
        let receiver = Ty::named(self.name.clone());
        let methods = self
            .methods
            .into_iter()
            .map(|pending| {
                let mut params = Vec::with_capacity(pending.params.len() + 1);
                params.push(receiver.clone());
                params.extend(pending.params);
                let qualified = format!("{}::{}", self.name, pending.name);
                let native = NativeFunction::new(qualified, params.clone(), pending.ret.clone(), pending.func);
                let signature = Signature::new(params, pending.ret);
                let slot = MethodSlot::new(&self.name, &pending.name, signature, Arc::new(native), pending.sealed);
                (pending.name, Arc::new(slot))
            })
            .collect();
        Arc::new(TypeDescriptor {
            name: self.name,
            type_id: TypeId::of::<T>(),
            methods,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        base: i64,
    }

    fn counter_type() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder::<Counter>("demo::Counter")
            .method("add", vec![Ty::Int(crate::IntTy::I64)], Ty::Int(crate::IntTy::I64), |this, args| {
                Ok(Value::Int(this.base + args.int(0)?))
            })
            .field("base", |this| Value::Int(this.base))
            .build()
    }

    #[test]
    fn slot_signature_includes_receiver() {
        let ty = counter_type();
        let slot = ty.method("add").cloned().unwrap();
        assert_eq!(slot.signature().to_string(), "fn(demo::Counter, i64) -> i64");
        assert_eq!(slot.qualified_name(), "demo::Counter::add");
        assert!(!slot.is_patched());
    }

    #[test]
    fn calls_dispatch_through_the_slot() {
        let ty = counter_type();
        let counter = ty.instance(Arc::new(Counter { base: 40 })).unwrap();
        let result = ty.call("add", vec![counter.clone(), Value::Int(2)]).unwrap();
        assert_eq!(result, Value::Int(42));

        let Value::Host(host) = &counter else {
            panic!("expected host value");
        };
        assert_eq!(ty.field(host, "base"), Some(Value::Int(40)));
    }

    #[test]
    fn instance_rejects_foreign_rust_types() {
        let ty = counter_type();
        assert!(ty.instance(Arc::new(String::from("nope"))).is_err());
    }
}
