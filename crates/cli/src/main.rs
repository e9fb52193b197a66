use std::process::ExitCode;

fn main() -> ExitCode {
    ubermelon_cli::run()
}
