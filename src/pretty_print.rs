use crate::config::Config;
use crate::evaluator::EvalError;
use crate::loader::{LoadError, LoadErrorKind};
use crate::parser::ParseError;
use ariadne::{Config as ReportConfig, Label, Report, ReportKind, Source};
use std::io::{self, Write};
use std::ops::Range;

fn parse_error_report(error: &ParseError, input: &str) -> (String, Range<usize>, String) {
    match error {
        ParseError::UnexpectedToken { found, expected } => (
            format!("Unexpected token: {}", found.kind),
            found.span.to_range(),
            format!("Expected {expected}"),
        ),
        ParseError::UnexpectedEof(expected) => {
            let end = input.len();
            (
                "Unexpected EOF".to_string(),
                end.saturating_sub(1)..end,
                format!("Expected {expected}"),
            )
        }
        ParseError::LexerError(lex_err) => (
            "Lexer Error".to_string(),
            lex_err.span.to_range(),
            lex_err.to_string(),
        ),
    }
}

fn eval_error_label(error: &EvalError) -> String {
    match error {
        EvalError::UndefinedIdentifier { .. } => "This identifier has not been bound".to_string(),
        EvalError::NotAFunction { found, .. } => format!("This is a {found}, not a function"),
        EvalError::UnknownCommand { .. } => "This does not name a special form".to_string(),
        EvalError::DivisionByZero { .. } => "This divisor is zero".to_string(),
        EvalError::IndexOutOfRange { index, len, .. } => {
            format!("Index {index} is outside 0..{len}")
        }
        EvalError::TypeMismatch {
            expected, found, ..
        } => format!("Expected {expected}, found {found}"),
        EvalError::ArityMismatch {
            expected, found, ..
        } => format!("Expected {expected} operands, found {found}"),
        EvalError::InvalidSpecialForm { message, .. } => message.clone(),
        EvalError::NoValue { .. } => "This expression produces no value".to_string(),
        EvalError::Output { reason, .. } => reason.clone(),
        EvalError::Import { module, .. } => format!("Importing `{module}` failed"),
    }
}

impl LoadError {
    /// Writes the error as an annotated excerpt of the file it happened in.
    /// Falls back to a single line when the file could not be read.
    pub fn write_report<W: Write>(&self, mut out: W, color: bool) -> io::Result<()> {
        let error = self.innermost();
        let (input, (message, range, label)) = match (&error.kind, error.source_text.as_deref()) {
            (LoadErrorKind::Parse(parse_err), Some(input)) => {
                (input, parse_error_report(parse_err, input))
            }
            (LoadErrorKind::Eval(eval_err), Some(input)) => (
                input,
                (
                    eval_err.to_string(),
                    eval_err.location().span.to_range(),
                    eval_error_label(eval_err),
                ),
            ),
            // No source to excerpt
            _ => return writeln!(out, "Error {}", error),
        };
        let name = error.path.display().to_string();
        let id = name.as_str();

        Report::build(ReportKind::Error, (id, range.clone()))
            .with_config(ReportConfig::default().with_color(color))
            .with_message(message)
            .with_label(Label::new((id, range)).with_message(label))
            .finish()
            .write((id, Source::from(input)), &mut out)
    }

    pub fn pretty_print(&self) {
        // Nothing sensible to do if stderr itself is gone
        let _ = self.write_report(io::stderr(), true);
    }
}

/// Reports a failed run the way the command-line runner does: a plain
/// `Error <message>` line, or an annotated report when `pretty_errors` is set.
/// `out` should be the stream the program wrote to, so the error lands after
/// its output. Returns whether the process should exit with a failure status.
pub fn report<W: Write>(
    err: &LoadError,
    config: &Config,
    color: bool,
    out: &mut W,
) -> io::Result<bool> {
    out.flush()?;
    if config.pretty_errors {
        err.write_report(&mut *out, color)?;
    } else {
        writeln!(out, "Error {}", err)?;
    }
    out.flush()?;
    Ok(config.exit_code_on_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Interpreter;

    fn report_for(input: &str) -> String {
        let mut interp = Interpreter::new(Vec::new(), Config::default());
        let err = interp
            .run_source("test.pi", input)
            .expect_err("Expected the run to fail");
        let mut out = Vec::new();
        err.write_report(&mut out, false).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_eval_error_report() {
        let report = report_for("[set a 1]\n[echo [add a missing]]");
        assert!(report.contains("undefined identifier: missing, line: 1"), "{}", report);
        assert!(report.contains("test.pi"), "{}", report);
        assert!(report.contains("This identifier has not been bound"), "{}", report);
    }

    #[test]
    fn test_parse_error_report() {
        let report = report_for("[echo 1]]");
        assert!(report.contains("Unexpected token: ]"), "{}", report);
        let report = report_for("[echo 1");
        assert!(report.contains("Unexpected EOF"), "{}", report);
    }

    #[test]
    fn test_lexer_error_report() {
        let report = report_for("[echo #]");
        assert!(report.contains("Lexer Error"), "{}", report);
        assert!(report.contains("unexpected character: #]"), "{}", report);
    }

    #[test]
    fn test_unreadable_import_falls_back_to_one_line() {
        let report = report_for("[import definitely_not_here]");
        assert!(report.starts_with("Error cannot read "), "{}", report);
        assert!(report.contains("definitely_not_here.pi"), "{}", report);
    }

    fn run_and_report(input: &str, config: Config) -> (String, bool) {
        let mut interp = Interpreter::new(Vec::new(), config.clone());
        let err = interp
            .run_source("main.pi", input)
            .expect_err("Expected the run to fail");
        let fail = report(&err, &config, false, interp.output_mut()).unwrap();
        (String::from_utf8(interp.into_output()).unwrap(), fail)
    }

    #[test]
    fn test_report_follows_program_output() {
        let (out, fail) = run_and_report("[echo 7]\n[printchar 65]\n[echo nope]", Config::default());
        assert_eq!(out, "7\nAError undefined identifier: nope, line: 2\n");
        assert!(!fail);
    }

    #[test]
    fn test_report_exit_code_opt_in() {
        let config = Config {
            exit_code_on_error: true,
            ..Config::default()
        };
        let (out, fail) = run_and_report("[div 1 0]", config);
        assert!(out.starts_with("Error "), "{}", out);
        assert!(fail);
    }

    #[test]
    fn test_report_pretty() {
        let config = Config {
            pretty_errors: true,
            ..Config::default()
        };
        let (out, fail) = run_and_report("[echo 1]\n[echo missing]", config);
        assert!(out.starts_with("1\n"), "{}", out);
        assert!(!out.contains("\nError undefined"), "{}", out);
        assert!(out.contains("main.pi"), "{}", out);
        assert!(out.contains("This identifier has not been bound"), "{}", out);
        assert!(!fail);
    }
}
