use crate::value::Value;
use indexmap::IndexMap;

/// Variable store of one interpreter session.
///
/// Names are kept in insertion order so that listings are stable:
/// - overwriting an existing name keeps its original position;
/// - removing a name and summoning it again moves it to the end.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: IndexMap<String, Value>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value bound to `name`.
    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, name: impl Into<String>, val: Value) {
        self.vars.insert(name.into(), val);
    }

    /// Remove a variable, returning its last value.
    pub fn remove_var(&mut self, name: &str) -> Option<Value> {
        self.vars.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}
