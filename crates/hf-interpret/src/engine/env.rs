use hf_core::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Local {
    value: Value,
    mutable: bool,
}

/// Lexical scopes of one function activation, innermost last.
#[derive(Debug, Clone)]
pub(crate) struct Env {
    scopes: Vec<HashMap<String, Local>>,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }
}

impl Env {
    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind `name` in the innermost scope, shadowing earlier bindings.
    pub(crate) fn define(&mut self, name: &str, value: Value, mutable: bool) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Local { value, mutable });
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(|local| &local.value)
    }

    /// The innermost binding of `name` and whether it was declared `mut`.
    pub(crate) fn get_mut(&mut self, name: &str) -> Option<(&mut Value, bool)> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .map(|local| (&mut local.value, local.mutable))
    }

    /// Every visible binding, inner bindings shadowing outer ones. Closures capture this.
    pub(crate) fn snapshot(&self) -> Vec<(String, Value, bool)> {
        let mut visible: HashMap<&str, &Local> = HashMap::new();
        for scope in &self.scopes {
            for (name, local) in scope {
                visible.insert(name, local);
            }
        }
        visible
            .into_iter()
            .map(|(name, local)| (name.to_string(), local.value.clone(), local.mutable))
            .collect()
    }

    /// Bindings of the outermost scope.
    pub(crate) fn root_bindings(&self) -> Vec<(String, Value)> {
        self.scopes
            .first()
            .map(|scope| {
                scope
                    .iter()
                    .map(|(name, local)| (name.clone(), local.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
