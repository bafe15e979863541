use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use relay::forward::Upstream;
use relay::routes::api_routes;
use settings::config::GatewayConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use warp::Filter;

mod relay;
mod settings;

#[derive(Parser)]
#[command(author, version, about = "Stateless relay for attendance kiosk uploads")]
struct Args {
    /// Load gateway settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Base URL of the recognition backend
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    backend_label: Option<String>,
    /// Serve the kiosk's static assets from this directory
    #[arg(long)]
    static_dir: Option<PathBuf>,
    #[arg(long)]
    backend_timeout_secs: Option<u64>,
    #[arg(long)]
    max_upload_bytes: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::load(path)?,
            None => GatewayConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(url) = self.backend_url {
            config.backend_url = url;
        }
        if let Some(label) = self.backend_label {
            config.backend_label = label;
        }
        if self.static_dir.is_some() {
            config.static_dir = self.static_dir;
        }
        if self.backend_timeout_secs.is_some() {
            config.backend_timeout_secs = self.backend_timeout_secs;
        }
        if let Some(limit) = self.max_upload_bytes {
            config.max_upload_bytes = limit;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let config = Args::parse().into_config()?;
    let upstream = Arc::new(Upstream::new(&config)?);

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating gateway runtime")?;
    runtime.block_on(serve(config, upstream))
}

async fn serve(config: GatewayConfig, upstream: Arc<Upstream>) -> anyhow::Result<()> {
    let api = api_routes(upstream, config.max_upload_bytes);

    let statics = match &config.static_dir {
        Some(dir) => {
            info!("serving static files from {}", dir.display());
            warp::fs::dir(dir.clone()).boxed()
        }
        None => warp::any()
            .and_then(|| async { Err::<warp::fs::File, _>(warp::reject::not_found()) })
            .boxed(),
    };

    let (addr, server) = warp::serve(api.or(statics))
        .try_bind_with_graceful_shutdown(config.bind, async {
            if let Err(err) = signal::ctrl_c().await {
                warn!("could not listen for Ctrl+C: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .with_context(|| format!("binding gateway on {}", config.bind))?;

    info!(
        "gateway listening on http://{} relaying to {}",
        addr, config.backend_url
    );
    server.await;
    info!("gateway stopped");
    Ok(())
}
