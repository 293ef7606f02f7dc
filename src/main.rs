use anyhow::{Context, Result};
use k3t::Cluster;
use k3t::cli::{Args, ConfigDiscovery, CredentialOutput, ExecutionMode, UpConfig};
use k3t::credentials::CredentialBundle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = args.mode().map_err(anyhow::Error::msg)?;

    match mode {
        ExecutionMode::Up(config) => {
            init_logging(config.verbose);
            run_up(config).await
        }
        ExecutionMode::ShowConfig { config_override } => {
            init_logging(false);
            let config = ConfigDiscovery::load(config_override.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "k3t=debug" } else { "k3t=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_up(up: UpConfig) -> Result<()> {
    let config = up.apply(ConfigDiscovery::load(up.config_override.as_deref())?);
    info!(image = %config.image, port = config.port, "Starting cluster");

    let mut cluster = Cluster::connect(config)
        .await
        .context("Creating cluster")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => cancel.cancel(),
                Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
            }
        }
    });

    let credentials = match cluster.start(&cancel).await {
        Ok(credentials) => credentials,
        Err(e) => {
            if let Err(cleanup_err) = cluster.cleanup().await {
                warn!("Cleanup after failed start also failed: {}", cleanup_err);
            }
            return Err(e).context("Starting cluster");
        }
    };

    if cancel.is_cancelled() {
        cluster.stop().await.context("Stopping cluster")?;
        return Ok(());
    }

    emit_credentials(&up, &cluster.server_url(), &credentials)?;

    info!("Cluster is up, press Ctrl-C to stop");
    cancel.cancelled().await;

    cluster.stop().await.context("Stopping cluster")?;
    Ok(())
}

fn emit_credentials(up: &UpConfig, server: &str, credentials: &CredentialBundle) -> Result<()> {
    if let Some(dir) = &up.output_dir {
        credentials
            .write_to_dir(dir)
            .with_context(|| format!("Writing credentials to {}", dir.display()))?;
        info!("Wrote credentials to {:?}", dir);
    }

    if let Some(path) = &up.kubeconfig {
        let yaml = credentials.to_kubeconfig(server).to_yaml()?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Writing kubeconfig to {}", path.display()))?;
        info!("Wrote kubeconfig to {:?}", path);
    }

    let output = CredentialOutput::new(server, credentials);
    if up.json {
        println!("{}", output.to_json()?);
    } else {
        print!("{}", output.to_text());
    }
    Ok(())
}
