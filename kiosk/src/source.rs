use crate::settings::KioskConfig;
use attendcore::capture::StillFrameSource;
use attendcore::FrameSource;
use log::info;

/// Picks the kiosk's frame source: a still directory when configured,
/// otherwise the attached camera.
pub fn open_source(config: &KioskConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    if let Some(dir) = &config.stills {
        info!("replaying stills from {}", dir.display());
        return Ok(Box::new(StillFrameSource::new(dir)));
    }
    camera_source(config.camera_index)
}

#[cfg(feature = "webcam")]
fn camera_source(index: u32) -> anyhow::Result<Box<dyn FrameSource>> {
    info!("using camera {}", index);
    Ok(Box::new(webcam::WebcamSource::new(index)))
}

#[cfg(not(feature = "webcam"))]
fn camera_source(_index: u32) -> anyhow::Result<Box<dyn FrameSource>> {
    anyhow::bail!("no frame source: pass --stills <dir> or build with the `webcam` feature")
}

#[cfg(feature = "webcam")]
mod webcam {
    use attendcore::capture::RgbImage;
    use attendcore::{ClientError, ClientResult, FrameSource};
    use log::debug;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::Camera;

    pub struct WebcamSource {
        index: u32,
        camera: Option<Camera>,
    }

    impl WebcamSource {
        pub fn new(index: u32) -> Self {
            Self {
                index,
                camera: None,
            }
        }
    }

    impl FrameSource for WebcamSource {
        fn open(&mut self) -> ClientResult<()> {
            if self.camera.is_some() {
                return Ok(());
            }
            let format =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
            let mut camera = Camera::new(CameraIndex::Index(self.index), format)
                .map_err(|e| ClientError::DeviceAccessDenied(e.to_string()))?;
            camera
                .open_stream()
                .map_err(|e| ClientError::DeviceAccessDenied(e.to_string()))?;
            self.camera = Some(camera);
            Ok(())
        }

        fn grab(&mut self) -> ClientResult<Option<RgbImage>> {
            let Some(camera) = self.camera.as_mut() else {
                return Ok(None);
            };
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    debug!("camera {} has no frame yet: {}", self.index, err);
                    return Ok(None);
                }
            };
            let decoded = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| ClientError::Encode(e.to_string()))?;
            // nokhwa links its own `image` release; hand the pixels over raw.
            let (width, height) = (decoded.width(), decoded.height());
            Ok(RgbImage::from_raw(width, height, decoded.into_raw()))
        }

        fn release(&mut self) {
            if let Some(mut camera) = self.camera.take() {
                if let Err(err) = camera.stop_stream() {
                    debug!("camera {} did not stop cleanly: {}", self.index, err);
                }
            }
        }
    }
}
