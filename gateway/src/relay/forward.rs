use crate::relay::upload::ImageUpload;
use crate::settings::config::GatewayConfig;
use anyhow::Context;
use attendcore::protocol::routes::{GET_HISTORY, IMAGE_FIELD, REG_NO_FIELD};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client};

/// Fallbacks for uploads that arrive without metadata.
const DEFAULT_FILENAME: &str = "blob";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend replied {0}")]
    Status(reqwest::StatusCode),
}

/// A backend reply ready to be handed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relayed {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// The single recognition backend this process talks to.
pub struct Upstream {
    client: Client,
    base: String,
    label: String,
}

impl Upstream {
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.backend_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("building backend HTTP client")?;
        Ok(Self {
            client,
            base: config.backend_url.trim_end_matches('/').to_string(),
            label: config.backend_label.clone(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn endpoint(&self, tail: &str) -> String {
        format!("{}/{}", self.base, tail)
    }

    /// Posts the image (and identity, for online mode) as a fresh multipart form.
    pub async fn submit(
        &self,
        route: &str,
        image: ImageUpload,
        reg_no: Option<&str>,
    ) -> Result<Relayed, RelayError> {
        let ImageUpload {
            bytes,
            filename,
            content_type,
        } = image;
        let file_name = filename.unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        let mime = content_type
            .filter(|mime| Part::bytes(Vec::new()).mime_str(mime).is_ok())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let part = Part::bytes(bytes).file_name(file_name).mime_str(&mime)?;

        let mut form = Form::new().part(IMAGE_FIELD, part);
        if let Some(reg_no) = reg_no {
            form = form.text(REG_NO_FIELD, reg_no.to_string());
        }

        let response = self
            .client
            .post(self.endpoint(route))
            .multipart(form)
            .send()
            .await?;
        Self::relay(response).await
    }

    /// `reg_no` is the raw path segment as received; it is forwarded unchanged.
    pub async fn history(&self, reg_no: &str) -> Result<Relayed, RelayError> {
        let url = self.endpoint(&format!("{}/{}", GET_HISTORY, reg_no));
        let response = self.client.get(url).send().await?;
        Self::relay(response).await
    }

    async fn relay(response: reqwest::Response) -> Result<Relayed, RelayError> {
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status));
        }
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(JSON_CONTENT_TYPE)
            .to_string();
        let body = response.bytes().await?.to_vec();
        Ok(Relayed { content_type, body })
    }
}
