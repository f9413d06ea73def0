use std::path::PathBuf;
use thiserror::Error;

pub const USAGE: &str = "usage: pilang [--pretty] [--exit-code] <file>";

/// Settings for one interpreter run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Appended to a module name by `import`.
    pub module_suffix: String,
    /// Directory `import` resolves modules against.
    pub base_dir: PathBuf,
    /// Report errors as annotated source excerpts instead of one line.
    pub pretty_errors: bool,
    /// Exit with a failure status when the run fails. Off by default: the
    /// plain contract is to print the error and exit normally.
    pub exit_code_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            module_suffix: ".pi".to_string(),
            base_dir: PathBuf::new(),
            pretty_errors: false,
            exit_code_on_error: false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing source file argument")]
    MissingFile,
    #[error("unknown option '{0}'")]
    UnknownFlag(String),
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
    #[error("help requested")]
    HelpRequested,
}

impl Config {
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Parses command-line arguments (without the program name) into a
    /// config and the path of the file to run.
    pub fn from_args<I>(args: I) -> Result<(Config, PathBuf), ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut config = Config::default();
        let mut file = None;
        for arg in args.into_iter().map(Into::into) {
            match arg.as_str() {
                "--pretty" => config.pretty_errors = true,
                "--exit-code" => config.exit_code_on_error = true,
                "-h" | "--help" => return Err(ConfigError::HelpRequested),
                flag if flag.starts_with("--") => {
                    return Err(ConfigError::UnknownFlag(arg));
                }
                _ if file.is_some() => return Err(ConfigError::UnexpectedArgument(arg)),
                _ => file = Some(PathBuf::from(arg)),
            }
        }
        let file = file.ok_or(ConfigError::MissingFile)?;
        Ok((config, file))
    }
}
