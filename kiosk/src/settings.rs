use anyhow::Context;
use attendcore::capture::{CaptureTiming, DEFAULT_JPEG_QUALITY};
use attendcore::prelude::{DISPLAY_WINDOW, SETTLE_DELAY};
use attendcore::CaptureMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Kiosk settings; every field may be overridden from the command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// API root of the gateway, including the `/api` prefix.
    pub gateway_url: String,
    pub mode: CaptureMode,
    /// Registration number for online mode.
    pub reg_no: Option<String>,
    /// Replay a directory of stills instead of opening a camera.
    pub stills: Option<PathBuf>,
    pub camera_index: u32,
    pub jpeg_quality: u8,
    /// Overrides the mode's capture period.
    pub period_ms: Option<u64>,
    pub settle_ms: u64,
    pub display_ms: u64,
    /// Viewfinder refresh between captures; 0 shows only submitted frames.
    pub preview_ms: u64,
    pub request_timeout_secs: Option<u64>,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:3000/api".into(),
            mode: CaptureMode::CheckIn,
            reg_no: None,
            stills: None,
            camera_index: 0,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            period_ms: None,
            settle_ms: SETTLE_DELAY.as_millis() as u64,
            display_ms: DISPLAY_WINDOW.as_millis() as u64,
            preview_ms: 200,
            request_timeout_secs: None,
        }
    }
}

impl KioskConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading kiosk config {}", path_ref.display()))?;
        let config: KioskConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing kiosk config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            anyhow::bail!("jpeg_quality must be within 1..=100, got {}", self.jpeg_quality);
        }
        if self.period_ms == Some(0) {
            anyhow::bail!("period_ms must be positive");
        }
        if self.gateway_url.trim().is_empty() {
            anyhow::bail!("gateway_url must not be empty");
        }
        Ok(())
    }

    /// The mode's default cadence unless `period_ms` overrides it.
    pub fn timing_for(&self, mode: CaptureMode) -> CaptureTiming {
        CaptureTiming {
            period: self
                .period_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| mode.default_period()),
            settle: Duration::from_millis(self.settle_ms),
        }
    }

    pub fn display_window(&self) -> Duration {
        Duration::from_millis(self.display_ms)
    }

    pub fn preview_interval(&self) -> Option<Duration> {
        (self.preview_ms > 0).then(|| Duration::from_millis(self.preview_ms))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_follow_mode_cadence() {
        let cfg = KioskConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.timing_for(CaptureMode::CheckIn).period, Duration::from_millis(1500));
        assert_eq!(cfg.timing_for(CaptureMode::Online).period, Duration::from_secs(15));
        assert_eq!(cfg.timing_for(CaptureMode::Online).settle, SETTLE_DELAY);
        assert_eq!(cfg.display_window(), DISPLAY_WINDOW);
        assert_eq!(cfg.preview_interval(), Some(Duration::from_millis(200)));
        let still = KioskConfig {
            preview_ms: 0,
            ..Default::default()
        };
        assert!(still.preview_interval().is_none());
    }

    #[test]
    fn config_load_reads_mode_and_overrides() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"mode: online-verify\nreg_no: R42\nperiod_ms: 2500\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = KioskConfig::load(&path).unwrap();
        assert_eq!(cfg.mode, CaptureMode::Online);
        assert_eq!(cfg.reg_no.as_deref(), Some("R42"));
        assert_eq!(
            cfg.timing_for(cfg.mode).period,
            Duration::from_millis(2500)
        );
        assert_eq!(cfg.jpeg_quality, DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let cfg = KioskConfig {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
