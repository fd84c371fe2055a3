use anyhow::{Context, Result};
use argh::FromArgs;
use line_shell::{Environment, ExitCode, Shell};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// A line-oriented command shell.
struct Args {
    #[argh(positional)]
    /// script to run line by line; without it commands are read interactively.
    script: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("LSH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(shell: &mut Shell, args: &Args) -> Result<ExitCode> {
    match &args.script {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            Ok(shell.run_script(BufReader::new(file))?)
        }
        None => Ok(shell.repl().context("line editor failed")?),
    }
}

fn main() {
    init_logging();
    let args: Args = argh::from_env();

    let mut shell = Shell::new(Environment::capture());
    let code = match run(&mut shell, &args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("lsh: {e:#}");
            std::process::exit(1);
        }
    };
    drop(shell);
    std::process::exit(-code);
}
