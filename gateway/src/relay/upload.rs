use attendcore::protocol::routes::{IMAGE_FIELD, REG_NO_FIELD};
use bytes::BufMut;
use futures_util::TryStreamExt;
use warp::multipart::{FormData, Part};

/// The uploaded image with the metadata the backend's parser relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Fields the gateway cares about from one multipart request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    pub image: Option<ImageUpload>,
    pub reg_no: Option<String>,
}

impl UploadForm {
    /// Reads every part; unknown fields are drained and dropped.
    pub async fn read(form: FormData) -> Result<Self, warp::Error> {
        let mut upload = UploadForm::default();
        let mut parts = form;
        while let Some(part) = parts.try_next().await? {
            match part.name() {
                IMAGE_FIELD if upload.image.is_none() => {
                    let filename = part.filename().map(String::from);
                    let content_type = part.content_type().map(String::from);
                    let bytes = read_part(part).await?;
                    upload.image = Some(ImageUpload {
                        bytes,
                        filename,
                        content_type,
                    });
                }
                REG_NO_FIELD => {
                    let raw = read_part(part).await?;
                    upload.reg_no = Some(String::from_utf8_lossy(&raw).into_owned());
                }
                _ => {
                    read_part(part).await?;
                }
            }
        }
        Ok(upload)
    }

    /// Registration number, if present and not blank.
    pub fn identity(&self) -> Option<&str> {
        self.reg_no.as_deref().filter(|value| !value.is_empty())
    }
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut buffer, chunk| {
            buffer.put(chunk);
            async move { Ok(buffer) }
        })
        .await
}
