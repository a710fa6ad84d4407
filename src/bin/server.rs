//! EngiChat chat function server.
//! Run with: cargo run --bin engichat-server

use std::process::ExitCode;

use engichat::start_engichat;

fn main() -> ExitCode {
    start_engichat::run()
}
