use clap::Parser;
use signalbt::cli::{Cli, init_tracing, run};
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }
    run(Cli::parse())
}
