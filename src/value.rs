use crate::types::Node;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(i64),
    Function(Rc<Function>),
    List(List),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Function(_) => "function",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Function(function) => write!(f, "{}", function),
            Value::List(list) => write!(f, "{}", list),
        }
    }
}

/// A user function: parameter names and a body. Nothing from the defining
/// environment is captured.
#[derive(Debug, PartialEq)]
pub struct Function {
    pub params: Vec<String>,
    pub body: Node,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<func")?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        write!(f, ">")
    }
}

/// A shared, mutable cell holding a value.
///
/// Environment bindings, list elements and evaluation results are all slots.
/// Cloning a `ValueRef` yields another handle to the same cell, so writing
/// through one handle is visible through every other.
#[derive(Clone)]
pub struct ValueRef(Rc<RefCell<Value>>);

impl ValueRef {
    pub fn new(value: Value) -> Self {
        ValueRef(Rc::new(RefCell::new(value)))
    }

    pub fn number(n: i64) -> Self {
        ValueRef::new(Value::Number(n))
    }

    /// A copy of the value currently held. Lists in the copy still share
    /// their element slots with the original.
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Overwrites the held value in place.
    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = value;
    }

    pub fn ptr_eq(&self, other: &ValueRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueRef({:?})", self.0.borrow())
    }
}

// Compares the held values, not identity; see `ptr_eq` for aliasing checks
impl PartialEq for ValueRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
    }
}

impl From<Value> for ValueRef {
    fn from(value: Value) -> Self {
        ValueRef::new(value)
    }
}

/// An ordered sequence of element slots.
///
/// Views produced by [`List::slice`] hold the same slots as their source, so
/// the two observe each other's element writes.
#[derive(Debug, Clone, PartialEq)]
pub struct List(Rc<[ValueRef]>);

impl List {
    /// Builds a list whose elements live in fresh slots.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        List(values.into_iter().map(ValueRef::new).collect())
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// The element slot at `index`, shared with this list.
    pub fn slot(&self, index: usize) -> Option<ValueRef> {
        self.0.get(index).cloned()
    }

    /// A new list sharing the element slots `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Option<List> {
        self.0.get(start..end).map(|slots| List(slots.into()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValueRef> {
        self.0.iter()
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[list")?;
        for slot in self.iter() {
            write!(f, " {}", slot.get())?;
        }
        write!(f, "]")
    }
}
