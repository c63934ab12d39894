use clap::Parser;
use clap::error::ErrorKind;
use sortbox::cli::{Cli, run_cli};
use sortbox::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1 like every other configuration problem.
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            // The exit code is all that is left to report if stderr is gone.
            e.print().ok();
            return ExitCode::from(code);
        }
    };

    logging::init_logger(cli.verbose);
    ExitCode::from(run_cli(&cli))
}
