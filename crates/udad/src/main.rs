//! Entry point for the `udad` server binary.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match udad::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(io::stderr(), "udad: {error}");
            ExitCode::FAILURE
        }
    }
}
