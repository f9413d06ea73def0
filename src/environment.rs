use crate::source::Span;
use crate::value::ValueRef;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("undefined identifier: {0}")]
    UndefinedIdentifier(String, Span), // Name, span where lookup happened
}

// --- Environment Definition ---

/// The one namespace of a run.
///
/// There are no nested frames: function parameters, `set` bindings and
/// imported definitions all land in this single map and stay there until
/// something rebinds the name.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: HashMap<String, ValueRef>,
}

impl Environment {
    /// Creates a new, empty environment ready to be shared.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Binds `name` to `value`, replacing any previous binding.
    pub fn define(&mut self, name: impl Into<String>, value: ValueRef) {
        self.bindings.insert(name.into(), value);
    }

    /// Looks up a binding. `lookup_span` is where the name was referenced,
    /// used for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<ValueRef, EnvError> {
        self.bindings
            .get(name)
            .cloned()
            .ok_or_else(|| EnvError::UndefinedIdentifier(name.to_string(), lookup_span))
    }

    /// Gets all bound names
    pub fn identifiers(&self) -> HashSet<String> {
        self.bindings.keys().cloned().collect()
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.borrow_mut().define("x", ValueRef::number(10));

        let result = env.borrow().get("x", Span::default());
        assert_eq!(result.unwrap().get(), Value::Number(10));
    }

    #[test]
    fn test_get_unbound() {
        let env = Environment::new();
        let span = Span::new(11, 12);
        let result = env.borrow().get("z", span);
        assert_eq!(
            result.unwrap_err(),
            EnvError::UndefinedIdentifier("z".to_string(), span)
        );
    }

    #[test]
    fn test_redefine_overwrites() {
        let env = Environment::new();
        env.borrow_mut().define("n", ValueRef::number(100));
        env.borrow_mut().define("n", ValueRef::number(5));

        assert_eq!(
            env.borrow().get("n", Span::default()).unwrap().get(),
            Value::Number(5)
        );
        assert_eq!(env.borrow().identifiers().len(), 1);
    }

    #[test]
    fn test_get_returns_shared_slot() {
        let env = Environment::new();
        let slot = ValueRef::number(1);
        env.borrow_mut().define("a", slot.clone());

        slot.set(Value::Number(2));
        let found = env.borrow().get("a", Span::default()).unwrap();
        assert!(found.ptr_eq(&slot));
        assert_eq!(found.get(), Value::Number(2));
    }

    #[test]
    fn test_identifiers() {
        let env = Environment::new();
        assert!(env.borrow().identifiers().is_empty());
        env.borrow_mut().define("a", ValueRef::number(1));
        env.borrow_mut().define("b", ValueRef::number(2));

        let names = env.borrow().identifiers();
        assert_eq!(names.len(), 2);
        assert!(names.contains("a") && names.contains("b"));
        assert!(!names.contains("c"));
    }
}
