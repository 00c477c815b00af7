use anyhow::Result;
use crossterm::style::{Color, Stylize};
use log::{error, info, warn};
use std::env;
use std::fs::OpenOptions;
use std::process::ExitCode;
use tpsl_dashboard::config::{ConfigOrigin, DEFAULT_CONFIG_FILE, DashboardConfig};
use tpsl_dashboard::connection::{self, TerminalSession};
use tpsl_dashboard::console::{Console, Operator};
use tpsl_dashboard::dispatcher::Dashboard;

fn init_logging(config: &DashboardConfig) {
    // Initialize logger with default info level if RUST_LOG not set
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    // The dashboard owns the screen, so records go to a file when possible
    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
    {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => eprintln!("Cannot open log file {}: {}", config.log_file, e),
    }
    builder.init();
}

fn run(config: &DashboardConfig, console: &mut Console) -> Result<()> {
    let mut session = TerminalSession::new(connection::open_terminal(config)?);
    console.resize();
    connection::startup_check(&mut session, console)?;

    let mut dashboard = Dashboard::new(&mut session, config);
    dashboard.run(console)
}

fn main() -> ExitCode {
    // Get config file from command line argument or use default
    let args: Vec<String> = env::args().collect();
    let config_file = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CONFIG_FILE);

    let (config, origin) = match DashboardConfig::load_from_file(config_file) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);
    info!("Starting TP/SL dashboard");
    match origin {
        ConfigOrigin::File => info!(
            "Loaded configuration from {} (backend {:?})",
            config_file, config.terminal.backend
        ),
        ConfigOrigin::Defaults => warn!("{} not found, using default configuration", config_file),
    }

    let mut console = Console::new();
    match run(&config, &mut console) {
        Ok(()) => {
            info!("Dashboard closed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Unexpected error: {:#}", e);
            let _ = console.show(&format!(
                "{}\n",
                format!("Unexpected error: {}", e).with(Color::Red)
            ));
            let _ = console.prompt("Press Enter to exit...");
            ExitCode::FAILURE
        }
    }
}
