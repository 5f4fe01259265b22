use clap::Parser;
use log::{error, info};
use mailshield::{Config, Role, SmtpServer, relay};
use std::path::PathBuf;
use std::process;

/// SMTP relay that hides the real address behind a shielded domain
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(default_value = "mailshield.toml")]
    config: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}: {e}", cli.config.display());
            process::exit(1);
        }
    };

    let handler = match relay::from_config(&config) {
        Ok(handler) => handler,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let addr = config.listen_addr();
    match config.role {
        Role::Server => info!("start serving at {addr} for {}", config.server.domain),
        Role::Relay => info!("start relaying at {addr}"),
    }

    let server = SmtpServer::new(config.hostname(), handler);
    if let Err(e) = server.start(&addr) {
        error!("Failed to start server: {e}");
        process::exit(1);
    }
}
