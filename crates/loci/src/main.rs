use std::process::ExitCode;

fn main() -> ExitCode {
    loci::app::run()
}
