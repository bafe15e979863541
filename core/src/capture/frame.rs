use crate::prelude::{ClientError, ClientResult, FrameSource};
use crate::protocol::routes::{CAPTURE_CONTENT_TYPE, CAPTURE_FILENAME};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// A still snapshot of the video source at native resolution.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    image: RgbImage,
}

impl CaptureFrame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Packed RGBA, for preview surfaces that want an alpha channel.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.image
            .pixels()
            .flat_map(|pixel| [pixel[0], pixel[1], pixel[2], u8::MAX])
            .collect()
    }

    /// Compresses the frame to JPEG, consuming it.
    pub fn encode(self, quality: u8) -> ClientResult<EncodedFrame> {
        let (width, height) = self.image.dimensions();
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
        encoder
            .encode_image(&self.image)
            .map_err(|e| ClientError::Encode(e.to_string()))?;
        Ok(EncodedFrame {
            bytes,
            width,
            height,
            filename: CAPTURE_FILENAME.to_string(),
            content_type: CAPTURE_CONTENT_TYPE.to_string(),
        })
    }
}

/// Compressed frame plus the multipart metadata the gateway forwards.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub filename: String,
    pub content_type: String,
}

/// Replays a directory of still images as if it were a camera.
pub struct StillFrameSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    opened: bool,
}

impl StillFrameSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: Vec::new(),
            cursor: 0,
            opened: false,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
            .unwrap_or(false)
    }
}

impl FrameSource for StillFrameSource {
    fn open(&mut self) -> ClientResult<()> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            ClientError::DeviceAccessDenied(format!("{}: {}", self.dir.display(), e))
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && Self::is_image(path))
            .collect();
        if files.is_empty() {
            return Err(ClientError::DeviceAccessDenied(format!(
                "no still frames in {}",
                self.dir.display()
            )));
        }
        files.sort();
        self.files = files;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn grab(&mut self) -> ClientResult<Option<RgbImage>> {
        if !self.opened || self.files.is_empty() {
            return Ok(None);
        }
        let path = &self.files[self.cursor % self.files.len()];
        self.cursor = self.cursor.wrapping_add(1);
        match image::open(path) {
            Ok(decoded) => Ok(Some(decoded.to_rgb8())),
            Err(e) => {
                log::debug!("skipping unreadable still {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn release(&mut self) {
        self.opened = false;
        self.files.clear();
    }
}
