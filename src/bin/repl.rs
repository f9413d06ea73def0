use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use pilang::{Config, Environment, Interpreter, TokenKind, init_tracing, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const HISTORY_FILE: &str = "pilang_history.txt";

struct PilangCompleter {
    env: Rc<RefCell<Environment>>,
}

impl PilangCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        PilangCompleter { env }
    }
}

impl rustyline::completion::Completer for PilangCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = match tokenize(&line[..pos]) {
            Ok(tokens) => match tokens.last() {
                // Only complete a word the cursor is still touching
                Some(token) if token.span.end == pos => match &token.kind {
                    TokenKind::Identifier(prefix) => prefix.clone(),
                    _ => return Ok((pos, vec![])),
                },
                _ => return Ok((pos, vec![])),
            },
            Err(_) => return Ok((pos, vec![])),
        };
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .identifiers()
            .union(&pilang::evaluator::special_form_identifiers())
            .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
            .collect();
        candidates.sort();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: BracketValidator,
    #[rustyline(Highlighter)]
    highlighter: BracketHighlighter,
    #[rustyline(Completer)]
    completer: PilangCompleter,
}

/// Keeps reading lines until every `[` has its `]`.
struct BracketValidator;

impl Validator for BracketValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth = 0usize;
        for (i, c) in ctx.input().chars().enumerate() {
            match c {
                '[' => depth += 1,
                ']' if depth == 0 => {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - Unmatched ']' at position {}",
                        i
                    ))));
                }
                ']' => depth -= 1,
                _ => {}
            }
        }
        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct BracketHighlighter;

impl Highlighter for BracketHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> std::borrow::Cow<'l, str> {
        // (char index in `line`, byte offset in `highlighted`) of each open bracket
        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut highlighted = String::new();
        let cursor = pos.wrapping_sub(1);

        for (i, c) in line.chars().enumerate() {
            match c {
                '[' => {
                    stack.push((i, highlighted.len()));
                    highlighted.push(c);
                }
                ']' => {
                    if let Some((open_index, open_offset)) = stack.pop() {
                        if open_index == cursor || i == cursor {
                            highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c)); // Blue for matching brackets
                            highlighted.replace_range(
                                open_offset..=open_offset,
                                "\x1b[1;34m[\x1b[0m",
                            );
                        } else {
                            highlighted.push(c);
                        }
                    } else {
                        highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for unmatched closing brackets
                    }
                }
                c if c.is_ascii_digit() => {
                    highlighted.push_str(&format!("\x1b[33m{}\x1b[0m", c)); // Yellow for numbers
                }
                _ => {
                    highlighted.push(c);
                }
            }
        }

        std::borrow::Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    init_tracing();
    println!("pilang REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let mut interpreter = Interpreter::new(io::stdout(), Config::default());
    let h = InputValidator {
        highlighter: BracketHighlighter,
        validator: BracketValidator,
        completer: PilangCompleter::new(interpreter.environment()),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Emacs)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("pilang> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }

                match interpreter.run_source("<repl>", trimmed_input) {
                    Ok(Some(value)) => println!("{}", value.get()),
                    Ok(None) => {}
                    Err(e) => e.pretty_print(),
                }
                interpreter.output_mut().flush()?;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_matches_bracket_after_number() {
        let line = "[1 [2]]";
        // cursor just after the inner `[`
        let highlighted = BracketHighlighter.highlight(line, 4);
        assert_eq!(
            highlighted,
            "[\x1b[33m1\x1b[0m \x1b[1;34m[\x1b[0m\x1b[33m2\x1b[0m\x1b[34m]\x1b[0m]"
        );
    }

    #[test]
    fn test_highlight_unmatched_close() {
        let highlighted = BracketHighlighter.highlight("a]", 0);
        assert_eq!(highlighted, "a\x1b[31m]\x1b[0m");
    }
}
