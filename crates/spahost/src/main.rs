//! spahost - Entry point
//!
//! Serves a built single-page application with runtime configuration
//! insertion, `.env` hot reload and per-request compression negotiation.

use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spahost_server::{Server, ServerParams};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command-line arguments.
struct Args {
    /// Directory containing the built application.
    working_directory: PathBuf,
    /// Port override.
    port: Option<u16>,
    /// Watched `.env` file override.
    dotenv_path: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut working_directory = PathBuf::from(".");
        let mut port = None;
        let mut dotenv_path = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--working-directory" | "-d" => {
                    if let Some(value) = args.next() {
                        working_directory = PathBuf::from(value);
                    }
                }
                "--port" | "-p" => {
                    port = args.next().and_then(|value| value.parse().ok());
                }
                "--dotenv-path" => {
                    dotenv_path = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("spahost {VERSION}");
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self {
            working_directory,
            port,
            dotenv_path,
        }
    }
}

fn print_help() {
    println!(
        r"spahost - Static SPA server with runtime configuration insertion

USAGE:
    spahost [OPTIONS]

OPTIONS:
    -d, --working-directory <PATH>  Directory containing the built application (default: .)
    -p, --port <PORT>               Port to listen on (default: 8080)
        --dotenv-path <PATH>        Watched .env file (default: /config/.env)
    -h, --help                      Print help information
    -v, --version                   Print version information

ENVIRONMENT VARIABLES:
    _PORT                    Port to listen on (default: 8080)
    _DOTENV_PATH             Watched .env file (default: /config/.env)
    _CACHE                   Enable the entity cache (default: true)
    _CACHE_BUFFER            Entity cache capacity (default: 51200)
    _CACHE_CONTROL_MAX_AGE   max-age for fingerprinted assets (default: 31536000)
    _COMPRESSION_THRESHOLD   Minimum size in bytes for compression (default: 1024)
    _CSP_TEMPLATE            Content-Security-Policy template; empty disables the header
    _LOG_LEVEL               ERROR, WARN, INFO, DEBUG or TRACE (default: INFO)
    _LOG_FORMAT              text or json (default: text)

EXAMPLES:
    # Serve the app in /usr/share/nginx/html on port 3000
    spahost -d /usr/share/nginx/html -p 3000

    # Enable JSON logs
    _LOG_FORMAT=json spahost -d dist/app
"
    );
}

fn init_tracing(params: &ServerParams) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| params.log_level.to_lowercase().into());
    let registry = tracing_subscriber::registry().with(filter);

    if params.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut params = ServerParams::new(args.working_directory).with_env_overrides();
    if let Some(port) = args.port {
        params.port = port;
    }
    if let Some(dotenv_path) = args.dotenv_path {
        params.dotenv_path = dotenv_path;
    }

    init_tracing(&params);

    info!("Starting spahost v{VERSION}");
    info!(
        directory = %params.working_directory.display(),
        port = params.port,
        "Serving application"
    );

    let port = params.port;
    let app = spahost_server::App::create(params);
    let server = Server::new(app, port);

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
