use crate::source::Span;
use std::fmt; // For custom display formatting

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Form, // The syntactic form
    pub span: Span, // The source span it covers
}

impl Node {
    pub fn new(kind: Form, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(Form::Atom(Atom::Integer(n)), span)
    }

    pub fn new_identifier(name: impl Into<String>, span: Span) -> Self {
        Node::new(Form::Atom(Atom::Identifier(name.into())), span)
    }

    pub fn new_list(children: Vec<Node>, span: Span) -> Self {
        Node::new(Form::List(children), span)
    }

    /// The identifier text if this node is an identifier atom.
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            Form::Atom(Atom::Identifier(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// A leaf of the syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Integer(i64),
    Identifier(String),
}

/// A parsed form: either an atom or a bracketed list of forms.
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Atom(Atom),
    List(Vec<Node>),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Integer(n) => write!(f, "{}", n),
            Atom::Identifier(name) => write!(f, "{}", name),
        }
    }
}

// Renders back to source syntax
impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Atom(atom) => write!(f, "{}", atom),
            Form::List(children) => {
                write!(f, "[")?;
                let mut first = true;
                for child in children {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", child)?;
                    first = false;
                }
                write!(f, "]")
            }
        }
    }
}
