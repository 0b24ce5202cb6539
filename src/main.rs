use anyhow::Result;
use argh::FromArgs;
use cthulhu_rites::{session, Interpreter};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Speak rituals to the Old Ones, interactively or from a scroll.
struct Args {
    #[argh(positional)]
    /// script to run line by line; an interactive session starts when omitted.
    script: Option<PathBuf>,
}

/// Enable diagnostics on stderr with `RUST_LOG=cthulhu_rites=debug`.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args: Args = argh::from_env();
    let mut interp = Interpreter::default();

    match args.script {
        Some(path) => session::run_file(&path, &mut interp),
        None => session::repl(&mut interp),
    }
}
