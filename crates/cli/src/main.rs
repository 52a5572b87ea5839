use std::process::ExitCode;

fn main() -> ExitCode {
    pagecraft_cli::run()
}
