use std::process::ExitCode;

fn main() -> ExitCode {
    crosstalk_cli::run()
}
