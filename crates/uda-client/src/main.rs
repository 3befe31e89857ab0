//! `uda`: fetch data from a UDA server from the command line.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    uda_client::cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
