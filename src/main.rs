use clap::Parser;
use elliott903::{Config, ExitReason};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(&config);

    match elliott903::run(config) {
        Ok(reason) => {
            log::info!("{}", describe(reason));
            ExitCode::from(reason.exit_code() as u8)
        }
        Err(e) => {
            log::error!("fatal: {e}");
            ExitCode::from(1)
        }
    }
}

fn describe(reason: ExitReason) -> String {
    match reason {
        ExitReason::DynamicStop(addr) => format!("dynamic stop at {addr:#06o}"),
        ExitReason::ReaderExhausted => "reader exhausted".to_string(),
        ExitReason::TtyExhausted => "teletype input exhausted".to_string(),
        ExitReason::InstructionLimit => "instruction limit reached".to_string(),
        ExitReason::PunchOverflow => "punch overflow".to_string(),
    }
}

fn init_logging(config: &Config) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if config.verbosity != 0 {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    });

    if let Some(path) = &config.log_to_file {
        match std::fs::File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("could not open log file {}: {e}", path.display());
            }
        }
    }

    builder.init();
}
