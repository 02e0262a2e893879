use avr_xref::args::{parse_args, Args};
use avr_xref::convert::convert;
use eyre::Result;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::EnvFilter;

fn init_tracing(args: &Args) {
    let level = if args.quiet {
        LevelFilter::OFF
    } else {
        match args.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let args = parse_args();
    init_tracing(&args);

    let succeeded = convert(&args)?;
    if args.strict && !succeeded {
        tracing::error!("external tool failed, exiting");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
