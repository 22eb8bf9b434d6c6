use std::process::ExitCode;

fn main() -> ExitCode {
    nickbook_cli::run()
}
