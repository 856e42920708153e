use std::process::ExitCode;

use ticketdesk_lib::cli;

fn main() -> ExitCode {
    match cli::run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {:#}", err);
            ExitCode::from(cli::exit_code(&err))
        }
    }
}
