use std::process::ExitCode;

fn main() -> ExitCode {
    attrconf_cli::run()
}
