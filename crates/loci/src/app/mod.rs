use std::process::ExitCode;

use tracing::error;

mod bootstrap;
mod loop_runner;
pub mod session;

pub fn run() -> ExitCode {
    match bootstrap::build_session() {
        Ok(wiring) => loop_runner::run(wiring),
        Err(message) => {
            error!(error = %message, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
