use clap::Parser;
use cost_report::args::{Args, Command};
use cost_report::commands::{self, PlotSource};
use cost_report::{Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let data_dir = args.common().data_dir().path();

    // This allows for running the program without an AWS account. When COST_REPORT_TEST_MODE is
    // set and non-zero in length, then the mode will be Mode::Test, otherwise it will be
    // Mode::Aws.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init => commands::init(data_dir).await?.print(),

        Command::Fetch(fetch_args) => {
            let config = Config::load(data_dir).await?;
            commands::fetch(config, mode, fetch_args.query())
                .await?
                .print()
        }

        Command::Plot(plot_args) => {
            let mut config = Config::load(data_dir).await?;
            if !plot_args.regions().is_empty() {
                config.set_regions(plot_args.regions().to_vec());
            }
            if plot_args.include_total() {
                config.set_include_total(true);
            }
            let source = match (plot_args.from_raw(), plot_args.csv()) {
                (true, _) => PlotSource::Raw,
                (false, Some(csv)) => PlotSource::Csv(csv.to_path_buf()),
                (false, None) => PlotSource::Csv(config.cache().latest_csv()),
            };
            commands::plot(config, source, plot_args.output())
                .await?
                .print()
        }

        Command::Report(report_args) => {
            let config = Config::load(data_dir).await?;
            commands::report(config, mode, report_args).await?.print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only. The binary and
            // the library share the crate name.
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
