use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process-wide gateway settings, fixed at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub backend_url: String,
    /// Name used in the generic 500 message.
    pub backend_label: String,
    pub static_dir: Option<PathBuf>,
    /// Unset means the gateway waits on the backend indefinitely.
    pub backend_timeout_secs: Option<u64>,
    pub max_upload_bytes: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            backend_url: "http://127.0.0.1:5000".into(),
            backend_label: "recognition".into(),
            static_dir: None,
            backend_timeout_secs: None,
            max_upload_bytes: 8 * 1024 * 1024,
        }
    }
}

impl GatewayConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading gateway config {}", path_ref.display()))?;
        let config: GatewayConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing gateway config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        reqwest::Url::parse(&self.backend_url)
            .with_context(|| format!("backend_url {:?} is not a valid URL", self.backend_url))?;
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be positive");
        }
        Ok(())
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_point_at_local_backend() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.bind.port(), 3000);
        assert_eq!(cfg.backend_url, "http://127.0.0.1:5000");
        assert!(cfg.backend_timeout().is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"backend_url: http://10.0.0.7:5000\nbackend_timeout_secs: 20\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = GatewayConfig::load(&path).unwrap();
        assert_eq!(cfg.backend_url, "http://10.0.0.7:5000");
        assert_eq!(cfg.backend_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(cfg.backend_label, "recognition");
    }

    #[test]
    fn invalid_backend_url_is_rejected() {
        let cfg = GatewayConfig {
            backend_url: "not a url".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
