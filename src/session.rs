//! Drivers that feed lines into an [`Interpreter`] and print what comes back.

use crate::interpreter::Interpreter;
use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

pub const BANNER: &str =
    "🐙 Welcome to the Cthulhu REPL. Type 'help' for guidance, 'quit' to escape.";
pub const PROMPT: &str = "cthulhu> ";
pub const FAREWELL: &str = "The void closes.";

/// Marker printed in front of every response.
pub const RESPONSE_MARK: &str = "↯";

/// Whether an interactive line asks to leave the session.
pub fn is_farewell(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "quit" | "exit")
}

/// Run one line and print its response, if any, to `out`.
pub fn answer(interp: &mut Interpreter, line: &str, out: &mut dyn Write) -> Result<()> {
    if let Some(response) = interp.run_line(line)? {
        writeln!(out, "{} {}", RESPONSE_MARK, response)?;
    }
    Ok(())
}

/// Interactive Read-Eval-Print Loop on the terminal.
///
/// Stops on `quit`/`exit` (any letter case), end of input or Ctrl-C.
pub fn repl(interp: &mut Interpreter) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut stdout = std::io::stdout();
    println!("{}", BANNER);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                if is_farewell(&line) {
                    println!("{}", FAREWELL);
                    break;
                }
                answer(interp, &line, &mut stdout)?;
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("failed to read line"),
        }
    }

    Ok(())
}

/// Feed every line of `reader` to the interpreter, in order.
///
/// No prompt, no banner, and `quit` is just another unknown line.
pub fn run_source(
    reader: impl BufRead,
    interp: &mut Interpreter,
    out: &mut dyn Write,
) -> Result<()> {
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("cannot read line {}", index + 1))?;
        answer(interp, &line, out)?;
    }
    Ok(())
}

/// Run a script file through the interpreter, printing responses to stdout.
pub fn run_file(path: &Path, interp: &mut Interpreter) -> Result<()> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    run_source(BufReader::new(file), interp, &mut std::io::stdout())
        .with_context(|| format!("while running {}", path.display()))
}
