use pilang::config::USAGE;
use pilang::pretty_print::report;
use pilang::{Config, ConfigError, Interpreter, init_tracing};
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let (config, file) = match Config::from_args(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(ConfigError::HelpRequested) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };
    init_tracing();

    let mut interpreter = Interpreter::new(BufWriter::new(io::stdout()), config.clone());
    match interpreter.run_file(&file) {
        Ok(_) => {
            let _ = interpreter.output_mut().flush();
            ExitCode::SUCCESS
        }
        // Program output and the error share stdout, in order
        Err(e) => match report(&e, &config, true, interpreter.output_mut()) {
            Ok(false) => ExitCode::SUCCESS,
            Ok(true) | Err(_) => ExitCode::FAILURE,
        },
    }
}
