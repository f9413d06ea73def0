use crate::evaluator::{EvalError, EvalResult, Interpreter};
use crate::parser::{ParseError, parse_str};
use crate::types::Node;
use crate::value::ValueRef;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// The stage a load failed in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadErrorKind {
    #[error("cannot read file: {0}")]
    File(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// A failure while loading and running one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadError {
    pub path: PathBuf,
    /// The file contents, when they could be read.
    pub source_text: Option<String>,
    pub kind: LoadErrorKind,
}

impl LoadError {
    fn new(path: &Path, source_text: &str, kind: LoadErrorKind) -> Self {
        LoadError {
            path: path.to_path_buf(),
            source_text: Some(source_text.to_string()),
            kind,
        }
    }

    fn unreadable(path: &Path, err: std::io::Error) -> Self {
        LoadError {
            path: path.to_path_buf(),
            source_text: None,
            kind: LoadErrorKind::File(err.to_string()),
        }
    }

    /// Follows `import` failures down to the file the error originated in.
    pub fn innermost(&self) -> &LoadError {
        match &self.kind {
            LoadErrorKind::Eval(EvalError::Import { source, .. }) => source.innermost(),
            _ => self,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoadErrorKind::File(reason) => {
                write!(f, "cannot read {}: {}", self.path.display(), reason)
            }
            other => write!(f, "{}", other),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            LoadErrorKind::File(_) => None,
            LoadErrorKind::Parse(err) => Some(err),
            LoadErrorKind::Eval(err) => Some(err),
        }
    }
}

/// Reads, tokenizes and parses a file into its top-level forms.
pub fn load_file(path: &Path) -> Result<(String, Vec<Node>), LoadError> {
    let source = fs::read_to_string(path).map_err(|err| LoadError::unreadable(path, err))?;
    let forms = parse_str(&source).map_err(|err| LoadError::new(path, &source, err.into()))?;
    debug!(path = %path.display(), forms = forms.len(), "parsed file");
    Ok((source, forms))
}

impl<W: Write> Interpreter<W> {
    /// Runs every top-level form of a file against the shared environment
    /// and returns the value of the last one.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> Result<Option<ValueRef>, LoadError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading file");
        let (source, forms) = load_file(path)?;
        self.execute(&forms)
            .map_err(|err| LoadError::new(path, &source, err.into()))
    }

    /// Like [`Interpreter::run_file`] for source already in memory. `name`
    /// labels the source in errors.
    pub fn run_source(
        &mut self,
        name: impl AsRef<Path>,
        source: &str,
    ) -> Result<Option<ValueRef>, LoadError> {
        let name = name.as_ref();
        let forms = parse_str(source).map_err(|err| LoadError::new(name, source, err.into()))?;
        self.execute(&forms)
            .map_err(|err| LoadError::new(name, source, err.into()))
    }

    /// Evaluates top-level forms in order. Each form's index is its line
    /// for error reporting; the first error stops the run.
    pub fn execute(&mut self, forms: &[Node]) -> EvalResult {
        let mut last = None;
        for (line, form) in forms.iter().enumerate() {
            last = self.evaluate(form, line)?;
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::value::Value;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn interpreter_in(dir: &TempDir) -> Interpreter<Vec<u8>> {
        Interpreter::new(Vec::new(), Config::default().with_base_dir(dir.path()))
    }

    fn output(interp: &Interpreter<Vec<u8>>) -> String {
        String::from_utf8(interp.output().clone()).unwrap()
    }

    #[test]
    fn test_run_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_file(
            temp_dir.path(),
            "main.pi",
            "[set x 5]\n[echo x]\n[add x 1]",
        );

        let mut interp = interpreter_in(&temp_dir);
        let last = interp.run_file(&path).unwrap();
        assert_eq!(last.map(|v| v.get()), Some(Value::Number(6)));
        assert_eq!(output(&interp), "5\n");
    }

    #[test]
    fn test_import_shares_namespace() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "greeting.pi", "[set greet 1]");
        let main = create_test_file(
            temp_dir.path(),
            "main.pi",
            "[import greeting]\n[echo greet]",
        );

        let mut interp = interpreter_in(&temp_dir);
        interp.run_file(&main).unwrap();
        assert_eq!(output(&interp), "1\n");
        assert_eq!(interp.lookup("greet"), Some(Value::Number(1)));
    }

    #[test]
    fn test_import_sees_and_overwrites_importer_bindings() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(
            temp_dir.path(),
            "lib.pi",
            "[set double [func [v] [mul v 2]]]\n[set base [call double base]]",
        );
        let main = create_test_file(
            temp_dir.path(),
            "main.pi",
            "[set base 21]\n[import lib]\n[echo base]\n[echo [call double 4]]",
        );

        let mut interp = interpreter_in(&temp_dir);
        interp.run_file(&main).unwrap();
        assert_eq!(output(&interp), "42\n8\n");
    }

    #[test]
    fn test_nested_imports() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "a.pi", "[import b] [set a [add b 1]]");
        create_test_file(temp_dir.path(), "b.pi", "[set b 10]");

        let mut interp = interpreter_in(&temp_dir);
        interp.run_source("main", "[import a] [echo a]").unwrap();
        assert_eq!(output(&interp), "11\n");
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut interp = interpreter_in(&temp_dir);
        let err = interp.run_file(temp_dir.path().join("nope.pi")).unwrap_err();
        assert!(matches!(err.kind, LoadErrorKind::File(_)));
        assert!(err.source_text.is_none());
        assert!(err.to_string().starts_with("cannot read "));
    }

    #[test]
    fn test_missing_import() {
        let temp_dir = TempDir::new().unwrap();
        let mut interp = interpreter_in(&temp_dir);
        let err = interp.run_source("main", "[set k 1]\n[import absent]").unwrap_err();

        match &err.kind {
            LoadErrorKind::Eval(EvalError::Import { module, at, source }) => {
                assert_eq!(module, "absent");
                assert_eq!(at.line, 1);
                assert!(matches!(source.kind, LoadErrorKind::File(_)));
                assert!(source.path.ends_with("absent.pi"));
            }
            other => panic!("Expected import failure, got {:?}", other),
        }
        // bindings made before the failure remain
        assert_eq!(interp.lookup("k"), Some(Value::Number(1)));
    }

    #[test]
    fn test_error_inside_import_reports_module_file() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "bad.pi", "[set ok 1]\n[echo nope]");

        let mut interp = interpreter_in(&temp_dir);
        let err = interp.run_source("main", "[import bad]").unwrap_err();
        let inner = err.innermost();
        assert!(inner.path.ends_with("bad.pi"));
        assert!(matches!(
            inner.kind,
            LoadErrorKind::Eval(EvalError::UndefinedIdentifier { ref name, at }) if name == "nope" && at.line == 1
        ));
        assert_eq!(inner.source_text.as_deref(), Some("[set ok 1]\n[echo nope]"));
        assert_eq!(interp.lookup("ok"), Some(Value::Number(1)));
    }

    #[test]
    fn test_lex_and_parse_errors_surface() {
        let temp_dir = TempDir::new().unwrap();
        let mut interp = interpreter_in(&temp_dir);

        let err = interp.run_source("main", "[echo 1] {").unwrap_err();
        assert!(matches!(
            err.kind,
            LoadErrorKind::Parse(ParseError::LexerError(_))
        ));

        let err = interp.run_source("main", "[echo 1").unwrap_err();
        assert!(matches!(
            err.kind,
            LoadErrorKind::Parse(ParseError::UnexpectedEof(_))
        ));
        // nothing runs when the file does not parse
        assert_eq!(output(&interp), "");
    }

    #[test]
    fn test_custom_suffix() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "m.lisp", "[set m 3]");
        let mut config = Config::default().with_base_dir(temp_dir.path());
        config.module_suffix = ".lisp".to_string();

        let mut interp = Interpreter::new(Vec::new(), config);
        interp.run_source("main", "[import m]").unwrap();
        assert_eq!(interp.lookup("m"), Some(Value::Number(3)));
    }

    #[test]
    fn test_load_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_file(temp_dir.path(), "p.pi", "[a] [b [c]]");
        let (source, forms) = load_file(&path).unwrap();
        assert_eq!(source, "[a] [b [c]]");
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[1].to_string(), "[b [c]]");
    }
}
