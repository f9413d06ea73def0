use crate::config::Config;
use crate::environment::{EnvError, Environment};
use crate::loader::LoadError;
use crate::primitives;
use crate::source::Location;
use crate::types::{Atom, Form, Node};
use crate::value::{Function, List, Value, ValueRef};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

// --- Evaluation Error ---
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("undefined identifier: {name}, {at}")]
    UndefinedIdentifier { name: String, at: Location },
    #[error("not a function: {name} is a {found}, {at}")]
    NotAFunction {
        name: String,
        found: &'static str,
        at: Location,
    },
    #[error("unknown command: {name}, {at}")]
    UnknownCommand { name: String, at: Location },
    #[error("division by zero in `{operator}`, {at}")]
    DivisionByZero { operator: &'static str, at: Location },
    #[error("index {index} out of range for list of length {len}, {at}")]
    IndexOutOfRange {
        index: i64,
        len: usize,
        at: Location,
    },
    #[error("type mismatch in `{operator}`: expected {expected}, found {found}, {at}")]
    TypeMismatch {
        operator: &'static str,
        expected: &'static str,
        found: &'static str,
        at: Location,
    },
    #[error("`{operator}` expects {expected} operands, got {found}, {at}")]
    ArityMismatch {
        operator: &'static str,
        expected: Arity,
        found: usize,
        at: Location,
    },
    #[error("invalid `{operator}` form: {message}, {at}")]
    InvalidSpecialForm {
        operator: &'static str,
        message: String,
        at: Location,
    },
    #[error("operand of `{operator}` produced no value, {at}")]
    NoValue { operator: &'static str, at: Location },
    #[error("failed to write output: {reason}, {at}")]
    Output { reason: String, at: Location },
    #[error("import of `{module}` failed, {at}: {source}")]
    Import {
        module: String,
        at: Location,
        source: Box<LoadError>,
    },
}

impl EvalError {
    fn from_env(err: EnvError, line: usize) -> Self {
        match err {
            EnvError::UndefinedIdentifier(name, span) => EvalError::UndefinedIdentifier {
                name,
                at: Location::new(line, span),
            },
        }
    }

    pub fn location(&self) -> Location {
        match self {
            EvalError::UndefinedIdentifier { at, .. }
            | EvalError::NotAFunction { at, .. }
            | EvalError::UnknownCommand { at, .. }
            | EvalError::DivisionByZero { at, .. }
            | EvalError::IndexOutOfRange { at, .. }
            | EvalError::TypeMismatch { at, .. }
            | EvalError::ArityMismatch { at, .. }
            | EvalError::InvalidSpecialForm { at, .. }
            | EvalError::NoValue { at, .. }
            | EvalError::Output { at, .. }
            | EvalError::Import { at, .. } => *at,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Option<ValueRef>> = Result<T, EvalError>;

// --- Special Forms ---

/// How many operands a special form takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// The fixed operator vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Call,
    Set,
    Func,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    If,
    Import,
    List,
    Index,
    Range,
    Edit,
    PrintChar,
    Newline,
    Print,
    Echo,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 19] = [
        SpecialForm::Call,
        SpecialForm::Set,
        SpecialForm::Func,
        SpecialForm::Add,
        SpecialForm::Sub,
        SpecialForm::Mul,
        SpecialForm::Div,
        SpecialForm::Mod,
        SpecialForm::Neg,
        SpecialForm::If,
        SpecialForm::Import,
        SpecialForm::List,
        SpecialForm::Index,
        SpecialForm::Range,
        SpecialForm::Edit,
        SpecialForm::PrintChar,
        SpecialForm::Newline,
        SpecialForm::Print,
        SpecialForm::Echo,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        SpecialForm::ALL.into_iter().find(|form| form.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Call => "call",
            SpecialForm::Set => "set",
            SpecialForm::Func => "func",
            SpecialForm::Add => "add",
            SpecialForm::Sub => "sub",
            SpecialForm::Mul => "mul",
            SpecialForm::Div => "div",
            SpecialForm::Mod => "mod",
            SpecialForm::Neg => "neg",
            SpecialForm::If => "if",
            SpecialForm::Import => "import",
            SpecialForm::List => "list",
            SpecialForm::Index => "index",
            SpecialForm::Range => "range",
            SpecialForm::Edit => "edit",
            SpecialForm::PrintChar => "printchar",
            SpecialForm::Newline => "newline",
            SpecialForm::Print => "print",
            SpecialForm::Echo => "echo",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            SpecialForm::Call => Arity::AtLeast(1),
            SpecialForm::List => Arity::AtLeast(0),
            SpecialForm::Newline => Arity::Exactly(0),
            SpecialForm::Neg
            | SpecialForm::Import
            | SpecialForm::PrintChar
            | SpecialForm::Print
            | SpecialForm::Echo => Arity::Exactly(1),
            SpecialForm::Set
            | SpecialForm::Func
            | SpecialForm::Add
            | SpecialForm::Sub
            | SpecialForm::Mul
            | SpecialForm::Div
            | SpecialForm::Mod
            | SpecialForm::Index => Arity::Exactly(2),
            SpecialForm::If | SpecialForm::Range | SpecialForm::Edit => Arity::Exactly(3),
        }
    }
}

/// Names of all special forms, for completion.
pub fn special_form_identifiers() -> HashSet<String> {
    SpecialForm::ALL
        .iter()
        .map(|form| form.name().to_string())
        .collect()
}

// --- Interpreter ---

/// Evaluation state for one run: the shared namespace, the output stream
/// that `echo`, `print`, `printchar` and `newline` write to, and the loader
/// configuration `import` resolves modules with.
pub struct Interpreter<W: Write> {
    pub(crate) env: Rc<RefCell<Environment>>,
    out: W,
    pub(crate) config: Config,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W, config: Config) -> Self {
        Interpreter::with_environment(Environment::new(), out, config)
    }

    pub fn with_environment(env: Rc<RefCell<Environment>>, out: W, config: Config) -> Self {
        Interpreter { env, out, config }
    }

    /// A handle to the shared namespace.
    pub fn environment(&self) -> Rc<RefCell<Environment>> {
        self.env.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// The current value bound to `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let found = self.env.borrow().get(name, Default::default());
        found.ok().map(|slot| slot.get())
    }

    /// Evaluates one node. `line` is the index of the top-level form being
    /// executed and is attached to any error.
    ///
    /// Forms that only have effects (`set`, `import`, `echo`, ...) yield `None`.
    pub fn evaluate(&mut self, node: &Node, line: usize) -> EvalResult {
        match &node.kind {
            Form::Atom(Atom::Integer(n)) => Ok(Some(ValueRef::number(*n))),
            Form::Atom(Atom::Identifier(name)) => {
                let found = self.env.borrow().get(name, node.span);
                found
                    .map(Some)
                    .map_err(|err| EvalError::from_env(err, line))
            }
            Form::List(children) => self.evaluate_list(node, children, line),
        }
    }

    fn evaluate_list(&mut self, node: &Node, children: &[Node], line: usize) -> EvalResult {
        let Some((operator, operands)) = children.split_first() else {
            return Err(EvalError::UnknownCommand {
                name: String::new(),
                at: Location::new(line, node.span),
            });
        };
        // A non-identifier operator is reported with an empty name
        let name = operator.as_identifier().unwrap_or_default();
        let Some(form) = SpecialForm::from_name(name) else {
            return Err(EvalError::UnknownCommand {
                name: name.to_string(),
                at: Location::new(line, operator.span),
            });
        };
        if !form.arity().accepts(operands.len()) {
            return Err(EvalError::ArityMismatch {
                operator: form.name(),
                expected: form.arity(),
                found: operands.len(),
                at: Location::new(line, node.span),
            });
        }
        trace!(form = form.name(), line, "dispatch");

        let at = Location::new(line, node.span);
        match form {
            SpecialForm::Call => self.evaluate_call(operands, line, at),
            SpecialForm::Set => {
                let name = self.binding_name(form, &operands[0], line)?;
                let value = self.evaluate_value(form, &operands[1], line)?;
                self.env.borrow_mut().define(name, value);
                Ok(None)
            }
            SpecialForm::Func => self.evaluate_func(&operands[0], &operands[1], line),
            SpecialForm::Add => self.arithmetic(form, operands, line, primitives::add),
            SpecialForm::Sub => self.arithmetic(form, operands, line, primitives::sub),
            SpecialForm::Mul => self.arithmetic(form, operands, line, primitives::mul),
            SpecialForm::Div => self.arithmetic(form, operands, line, primitives::div),
            SpecialForm::Mod => self.arithmetic(form, operands, line, primitives::rem),
            SpecialForm::Neg => {
                let n = self.evaluate_number(form, &operands[0], line)?;
                Ok(Some(ValueRef::number(n.wrapping_neg())))
            }
            SpecialForm::If => {
                let condition = self.evaluate_value(form, &operands[0], line)?;
                // Only numbers <= 0 are false; lists and functions count as true
                let branch = match condition.get() {
                    Value::Number(n) if n <= 0 => &operands[2],
                    _ => &operands[1],
                };
                self.evaluate(branch, line)
            }
            SpecialForm::Import => {
                let module = self.binding_name(form, &operands[0], line)?;
                self.import(module, at)?;
                Ok(None)
            }
            SpecialForm::List => {
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    values.push(self.evaluate_value(form, operand, line)?.get());
                }
                Ok(Some(ValueRef::new(Value::List(List::from_values(values)))))
            }
            SpecialForm::Index => {
                let list = self.evaluate_list_value(form, &operands[0], line)?;
                let i = self.evaluate_number(form, &operands[1], line)?;
                primitives::index(&list, i, at).map(Some)
            }
            SpecialForm::Range => {
                let list = self.evaluate_list_value(form, &operands[0], line)?;
                let start = self.evaluate_number(form, &operands[1], line)?;
                let end = self.evaluate_number(form, &operands[2], line)?;
                let view = primitives::range(&list, start, end, at)?;
                Ok(Some(ValueRef::new(Value::List(view))))
            }
            SpecialForm::Edit => self.evaluate_edit(operands, line, at),
            SpecialForm::PrintChar => {
                let code = self.evaluate_number(form, &operands[0], line)?;
                let mut buf = [0; 4];
                let text = primitives::code_point_char(code).encode_utf8(&mut buf);
                self.emit(text, at)?;
                Ok(None)
            }
            SpecialForm::Newline => {
                self.emit("\n", at)?;
                Ok(None)
            }
            SpecialForm::Print => {
                let list = self.evaluate_list_value(form, &operands[0], line)?;
                let text = primitives::decode_chars(&list, Location::new(line, operands[0].span))?;
                self.emit(&text, at)?;
                Ok(None)
            }
            SpecialForm::Echo => {
                let value = self.evaluate_value(form, &operands[0], line)?;
                let mut text = String::new();
                primitives::render(&value.get(), at, &mut text);
                text.push('\n');
                self.emit(&text, at)?;
                Ok(None)
            }
        }
    }

    /// Binds each parameter straight into the shared namespace, in order,
    /// then evaluates the body there. Nothing is restored afterwards.
    fn evaluate_call(&mut self, operands: &[Node], line: usize, at: Location) -> EvalResult {
        let (callee, arguments) = (&operands[0], &operands[1..]);
        let function = match self.evaluate_value(SpecialForm::Call, callee, line)?.get() {
            Value::Function(function) => function,
            other => {
                return Err(EvalError::NotAFunction {
                    name: callee.to_string(),
                    found: other.type_name(),
                    at: Location::new(line, callee.span),
                });
            }
        };
        if arguments.len() < function.params.len() {
            return Err(EvalError::ArityMismatch {
                operator: SpecialForm::Call.name(),
                expected: Arity::AtLeast(function.params.len() + 1),
                found: operands.len(),
                at,
            });
        }
        trace!(callee = %callee, params = ?function.params, line, "call");

        // Arguments past the parameter count are never evaluated
        for (param, argument) in function.params.iter().zip(arguments) {
            let value = self.evaluate_value(SpecialForm::Call, argument, line)?;
            self.env.borrow_mut().define(param.clone(), value);
        }
        self.evaluate(&function.body, line)
    }

    fn evaluate_func(&mut self, params: &Node, body: &Node, line: usize) -> EvalResult {
        let invalid = |message: &str| EvalError::InvalidSpecialForm {
            operator: SpecialForm::Func.name(),
            message: message.to_string(),
            at: Location::new(line, params.span),
        };
        let Form::List(param_nodes) = &params.kind else {
            return Err(invalid("parameters must be a bracketed list"));
        };
        let params = param_nodes
            .iter()
            .map(|param| {
                param
                    .as_identifier()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("parameter names must be identifiers"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let function = Function {
            params,
            body: body.clone(),
        };
        Ok(Some(ValueRef::new(Value::Function(Rc::new(function)))))
    }

    /// Overwrites one element of a bound list in place, so every alias of
    /// that element observes the new value.
    fn evaluate_edit(&mut self, operands: &[Node], line: usize, at: Location) -> EvalResult {
        let form = SpecialForm::Edit;
        let target = &operands[0];
        let name = self.binding_name(form, target, line)?;
        let i = self.evaluate_number(form, &operands[1], line)?;
        let new_value = self.evaluate_value(form, &operands[2], line)?.get();

        let found = self.env.borrow().get(name, target.span);
        let binding = found.map_err(|err| EvalError::from_env(err, line))?;
        let Value::List(list) = binding.get() else {
            return Err(EvalError::TypeMismatch {
                operator: form.name(),
                expected: "list",
                found: binding.get().type_name(),
                at: Location::new(line, target.span),
            });
        };
        primitives::index(&list, i, at)?.set(new_value);
        Ok(Some(binding))
    }

    fn import(&mut self, module: &str, at: Location) -> EvalResult<()> {
        let path = self
            .config
            .base_dir
            .join(format!("{}{}", module, self.config.module_suffix));
        self.run_file(&path)
            .map(|_| ())
            .map_err(|err| EvalError::Import {
                module: module.to_string(),
                at,
                source: Box::new(err),
            })
    }

    fn arithmetic(
        &mut self,
        form: SpecialForm,
        operands: &[Node],
        line: usize,
        op: fn(i64, i64) -> Option<i64>,
    ) -> EvalResult {
        let left = self.evaluate_number(form, &operands[0], line)?;
        let right = self.evaluate_number(form, &operands[1], line)?;
        match op(left, right) {
            Some(result) => Ok(Some(ValueRef::number(result))),
            None => Err(EvalError::DivisionByZero {
                operator: form.name(),
                at: Location::new(line, operands[1].span),
            }),
        }
    }

    /// Evaluates an operand that must produce a value.
    fn evaluate_value(&mut self, form: SpecialForm, node: &Node, line: usize) -> EvalResult<ValueRef> {
        self.evaluate(node, line)?.ok_or(EvalError::NoValue {
            operator: form.name(),
            at: Location::new(line, node.span),
        })
    }

    fn evaluate_number(&mut self, form: SpecialForm, node: &Node, line: usize) -> EvalResult<i64> {
        match self.evaluate_value(form, node, line)?.get() {
            Value::Number(n) => Ok(n),
            other => Err(self.type_mismatch(form, "number", &other, node, line)),
        }
    }

    fn evaluate_list_value(&mut self, form: SpecialForm, node: &Node, line: usize) -> EvalResult<List> {
        match self.evaluate_value(form, node, line)?.get() {
            Value::List(list) => Ok(list),
            other => Err(self.type_mismatch(form, "list", &other, node, line)),
        }
    }

    fn type_mismatch(
        &self,
        form: SpecialForm,
        expected: &'static str,
        found: &Value,
        node: &Node,
        line: usize,
    ) -> EvalError {
        EvalError::TypeMismatch {
            operator: form.name(),
            expected,
            found: found.type_name(),
            at: Location::new(line, node.span),
        }
    }

    /// An operand naming a binding or module, taken literally.
    fn binding_name<'a>(&self, form: SpecialForm, node: &'a Node, line: usize) -> EvalResult<&'a str> {
        node.as_identifier()
            .ok_or_else(|| EvalError::InvalidSpecialForm {
                operator: form.name(),
                message: format!("expected an identifier, found `{}`", node),
                at: Location::new(line, node.span),
            })
    }

    fn emit(&mut self, text: &str, at: Location) -> EvalResult<()> {
        self.out
            .write_all(text.as_bytes())
            .map_err(|err| EvalError::Output {
                reason: err.to_string(),
                at,
            })
    }
}
