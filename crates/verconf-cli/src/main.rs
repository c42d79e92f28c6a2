use std::process::ExitCode;

fn main() -> ExitCode {
    verconf_cli::run()
}
