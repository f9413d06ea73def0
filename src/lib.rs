// Declare modules publicly so they are part of the library interface
pub mod config;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;
pub mod value;

pub use config::{Config, ConfigError};
pub use environment::{EnvError, Environment};
pub use evaluator::{EvalError, EvalResult, Interpreter, SpecialForm};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use loader::{LoadError, LoadErrorKind, load_file};
pub use parser::{ParseError, Parser, parse_str};
pub use source::{Location, Span};
pub use types::{Atom, Form, Node};
pub use value::{Function, List, Value, ValueRef};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs a stderr log subscriber filtered by `RUST_LOG`, e.g.
/// `RUST_LOG=pilang=trace`. Does nothing when `RUST_LOG` is unset, so
/// program output on stdout stays clean.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}
