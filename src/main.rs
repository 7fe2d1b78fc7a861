use clap::Parser;
use pdl2pdf::{
    cli,
    orchestrator::{EXIT_FATAL, EXIT_USAGE},
    util::local_offset,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Before anything spawns a thread.
    let offset = local_offset();

    let args = match cli::Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // --help and --version also arrive here.
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match cli::dispatch(args, offset) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
