use anyhow::Context;
use clap::Parser;
use pingora_core::apps::http_app::HttpServer;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use pingora_core::services::listening::Service;
use std::path::PathBuf;
use kagami::config::Config;
use kagami::proxy::KagamiApp;

/// Kagami - on-demand image and video transformation server
#[derive(Parser, Debug)]
#[command(name = "kagami")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration before logging so the subscriber honors logging.*
    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if args.test {
        println!("Configuration file {} is valid", args.config.display());
        return Ok(());
    }

    kagami::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging subsystem: {}", e))?;

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        cloud_mode = config.is_cloud_mode(),
        "Configuration loaded successfully"
    );

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt)).context("Failed to create Pingora server")?;
    server.bootstrap();

    // Storage clients are built once, outside the server's worker runtimes
    let runtime = tokio::runtime::Runtime::new().context("Failed to start setup runtime")?;
    let app = runtime.block_on(KagamiApp::from_config(&config));
    drop(runtime);

    let mut service = Service::new("Kagami HTTP".to_string(), HttpServer::new_app(app));
    service.threads = Some(config.server.threads);

    let listen_addr = config.server.listen_addr();
    service.add_tcp(&listen_addr);

    tracing::info!(
        address = %listen_addr,
        "Starting Kagami media server"
    );

    server.add_service(service);

    // Run server forever (blocks until shutdown)
    server.run_forever();
}
