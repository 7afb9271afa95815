use clap::Parser;
use log::LevelFilter;

use loadlink::LinkConfig;

mod app;
mod cli;

use cli::{Args, CliError, Command};

fn main() {
    match loadcom() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn loadcom() -> Result<(), CliError> {
    let args = Args::try_parse()?;
    log_setup(&args);

    let mut config = LinkConfig::default();
    if let Some(cap) = args.max_threads {
        config.with_max_threads(cap);
    }

    match &args.command {
        Command::Tx { file } => app::run_tx(&config, file)?,
        Command::Rx => app::run_rx(&config)?,
    }

    Ok(())
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("loadlink", log_filter)
            .filter_module("loadcom", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}
