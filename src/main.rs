//! Network Speed Tester - Main CLI Application
//!
//! Runs throughput and latency tests locally, drives them on a remote agent,
//! or serves the data endpoints other testers measure against.

use clap::Parser;
use network_speed_tester::{
    cli::{Cli, Command, RemoteArgs, ServeArgs},
    config::{display_config_summary, ConfigParser, ValidationLevel, ValidationWarning},
    control::RemoteController,
    error::{AppError, ErrorReporter, Result},
    logging::LoggerFactory,
    models::Config,
    server::{DataServer, ServerConfig},
    ConsoleRenderer, EngineSettings, HttpTransport, MeasurementEngine, BUILD_TIME, GIT_COMMIT,
    PKG_NAME, TARGET_TRIPLE, VERSION,
};
use std::{process, sync::Arc};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<()> {
    cli.validate().map_err(AppError::config)?;

    if cli.debug {
        println!("{} v{} ({})", PKG_NAME, VERSION, GIT_COMMIT.unwrap_or("unknown commit"));
        println!("Built {} for {}", BUILD_TIME, TARGET_TRIPLE);
        println!("Debug mode enabled");
        println!();
    }

    let (config, warnings) = ConfigParser::new(cli.clone()).parse_with_warnings()?;
    if config.debug {
        println!("Configuration loaded successfully:");
        println!("{}", display_config_summary(&config));
        println!();
    }

    // Ctrl-C stops the current phase; done is still reported
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let factory = LoggerFactory::new(config.clone());
    match cli.command {
        Command::Run(_) => run_local(&config, &warnings, &factory, cancel).await,
        Command::Remote(ref args) => run_remote(args, &config, &warnings, &factory, cancel).await,
        Command::Serve(ref args) => serve(args, &config, &warnings, &factory, cancel).await,
    }
}

/// Run every phase from this machine against the configured data server
async fn run_local(
    config: &Config,
    warnings: &[ValidationWarning],
    factory: &LoggerFactory,
    cancel: CancellationToken,
) -> Result<()> {
    let test_config = config.to_test_config()?;
    let settings = EngineSettings::default();
    let logger = Arc::new(factory.create_logger("ENGINE").await);

    let renderer = ConsoleRenderer::stdout(config.enable_color);
    show_warnings(&renderer, warnings, config.verbose)?;
    renderer.render_header(&test_config)?;

    let transport = HttpTransport::new(&test_config, &settings)?;
    let engine = MeasurementEngine::new(Arc::new(transport), settings, logger);
    let report = engine.run(&test_config, &renderer, cancel).await;

    if report.delivery_failed {
        return Err(AppError::io("Console output failed during the test"));
    }
    if report.cancelled {
        renderer.render_warning("Test interrupted before all phases completed")?;
    }
    Ok(())
}

/// Start the test on an agent and render what it reports
async fn run_remote(
    args: &RemoteArgs,
    config: &Config,
    warnings: &[ValidationWarning],
    factory: &LoggerFactory,
    cancel: CancellationToken,
) -> Result<()> {
    let test_config = config.to_test_config()?;
    let settings = EngineSettings::default();
    let logger = Arc::new(factory.create_logger("REMOTE").await);
    let controller = RemoteController::new(&args.agent, settings.connect_timeout, logger)?;

    let renderer = ConsoleRenderer::stdout(config.enable_color);
    show_warnings(&renderer, warnings, config.verbose)?;
    println!("Connecting to {}...", controller.url());
    renderer.render_header(&test_config)?;

    let outcome = controller.run(&test_config, &renderer, cancel).await?;
    if !outcome.completed {
        renderer.render_warning("Test interrupted before the agent reported done")?;
    }
    Ok(())
}

/// Serve the data and control endpoints until Ctrl-C
async fn serve(
    args: &ServeArgs,
    config: &Config,
    warnings: &[ValidationWarning],
    factory: &LoggerFactory,
    cancel: CancellationToken,
) -> Result<()> {
    let logger = Arc::new(factory.create_service_logger("SERVER").await);
    for warning in warnings.iter().filter(|w| w.level != ValidationLevel::Info) {
        logger.warn(&warning.message).log().await;
    }

    let server_config = ServerConfig {
        bind_addr: args.bind.clone(),
        port: config.server_port,
    };
    DataServer::new(server_config, EngineSettings::default(), logger, cancel)
        .run()
        .await
}

fn show_warnings(renderer: &ConsoleRenderer, warnings: &[ValidationWarning], verbose: bool) -> Result<()> {
    for warning in warnings {
        if warning.level != ValidationLevel::Info || verbose {
            renderer.render_warning(&warning.message)?;
        }
    }
    Ok(())
}
