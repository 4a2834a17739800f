use std::process::ExitCode;

fn main() -> ExitCode {
    quoteworks_cli::run()
}
