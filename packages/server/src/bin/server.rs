//! Bosun server binary — boots the controller, then serves the
//! management endpoint until a shutdown signal arrives.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bosun_core::{ModelValue, PathAddress};
use bosun_server::boot::{apply_boot, load_boot_file};
use bosun_server::handlers::{register_builtin, ADD_HOST};
use bosun_server::network::ManagementServer;
use bosun_server::pipeline::OperationRequest;
use bosun_server::{ManagementController, ServerConfig, ServerLifecycle};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Clustered application-server management controller.
#[derive(Parser, Debug)]
#[command(name = "bosun-server", version, about)]
struct Args {
    /// Path to a JSON configuration file.
    #[arg(long, env = "BOSUN_CONFIG")]
    config: Option<PathBuf>,

    /// Management endpoint bind address (overrides the config file).
    #[arg(long, env = "BOSUN_BIND")]
    bind: Option<SocketAddr>,

    /// Host name registered during boot (overrides the config file).
    #[arg(long, env = "BOSUN_HOST_NAME")]
    host_name: Option<String>,

    /// Boot file replayed before serving (overrides the config file).
    #[arg(long, env = "BOSUN_BOOT_FILE")]
    boot_file: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, env = "BOSUN_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(error) => error!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("received SIGTERM, initiating graceful shutdown"),
    }
}

/// Runs every boot operation with the boot window still open.
fn boot_controller(controller: &ManagementController, config: &ServerConfig) -> anyhow::Result<()> {
    if let Some(name) = &config.host_name {
        let mut params = ModelValue::object();
        params.set("name", name.as_str())?;
        let request = OperationRequest::new(PathAddress::root(), ADD_HOST, params);
        let outcome = controller.execute(&request);
        if !outcome.is_success() {
            anyhow::bail!("registering host `{name}` failed: {}", outcome.body);
        }
        info!(host = %name, "local host registered");
    }

    if let Some(path) = &config.boot_file {
        let requests = load_boot_file(path)?;
        apply_boot(controller, &requests)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(host_name) = args.host_name {
        config.host_name = Some(host_name);
    }
    if let Some(boot_file) = args.boot_file {
        config.boot_file = Some(boot_file);
    }

    let lifecycle = Arc::new(ServerLifecycle::new());
    let controller = Arc::new(ManagementController::new(Arc::clone(&lifecycle)));
    register_builtin(&controller);

    boot_controller(&controller, &config)?;
    controller.finish_boot();

    let mut server = ManagementServer::new(config, controller);
    server.start().await?;

    {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move {
            shutdown_signal().await;
            lifecycle.begin_shutdown();
        });
    }

    server.serve().await
}
