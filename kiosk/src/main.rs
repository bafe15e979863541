use anyhow::Context;
use attendcore::gateway_client::GatewayClient;
use attendcore::CaptureMode;
use clap::Parser;
use env_logger::Env;
use settings::KioskConfig;
use std::path::PathBuf;

mod app;
mod headless;
mod settings;
mod source;
mod viewfinder;

#[derive(Parser)]
#[command(author, version, about = "Face attendance capture kiosk")]
struct Args {
    /// Load kiosk settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Gateway API root, e.g. http://127.0.0.1:3000/api
    #[arg(long)]
    gateway_url: Option<String>,
    /// check-in, check-out or online
    #[arg(long)]
    mode: Option<CaptureMode>,
    #[arg(long)]
    reg_no: Option<String>,
    /// Replay still images from this directory instead of a camera
    #[arg(long)]
    stills: Option<PathBuf>,
    #[arg(long)]
    camera_index: Option<u32>,
    #[arg(long)]
    jpeg_quality: Option<u8>,
    #[arg(long)]
    period_ms: Option<u64>,
    #[arg(long)]
    request_timeout_secs: Option<u64>,
    /// Run the capture loop without opening a window
    #[arg(long, default_value_t = false)]
    headless: bool,
}

impl Args {
    fn to_config(&self) -> anyhow::Result<KioskConfig> {
        let mut config = match &self.config {
            Some(path) => KioskConfig::load(path)?,
            None => KioskConfig::default(),
        };
        if let Some(url) = &self.gateway_url {
            config.gateway_url = url.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.reg_no.is_some() {
            config.reg_no = self.reg_no.clone();
        }
        if self.stills.is_some() {
            config.stills = self.stills.clone();
        }
        if let Some(index) = self.camera_index {
            config.camera_index = index;
        }
        if let Some(quality) = self.jpeg_quality {
            config.jpeg_quality = quality;
        }
        if self.period_ms.is_some() {
            config.period_ms = self.period_ms;
        }
        if self.request_timeout_secs.is_some() {
            config.request_timeout_secs = self.request_timeout_secs;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.to_config()?;
    let client = GatewayClient::new(&config.gateway_url, config.request_timeout())
        .context("configuring gateway client")?;

    if args.headless {
        return headless::run(config, client);
    }
    app::run(config, client).context("running kiosk window")
}
