use std::process::ExitCode;

fn main() -> ExitCode {
    cloudcost_cli::run()
}
