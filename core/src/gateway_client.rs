use crate::prelude::{ClientError, ClientResult, SubmissionRequest, VerificationService};
use crate::protocol::routes::{self, ErrorBody};
use crate::protocol::{AttendanceRecord, VerificationVerdict};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// HTTP client for the gateway's `/api` surface.
#[derive(Clone, Debug)]
pub struct GatewayClient {
    client: Client,
    base: Url,
}

impl GatewayClient {
    /// `base_url` is the gateway's API root, e.g. `http://127.0.0.1:3000/api`.
    ///
    /// `timeout` bounds each request; `None` waits as long as the gateway does.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> ClientResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ClientError::TransportFailure(format!("invalid gateway url {}: {}", base_url, e)))?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::TransportFailure(e.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::TransportFailure(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn submit(&self, request: SubmissionRequest) -> ClientResult<VerificationVerdict> {
        let SubmissionRequest { target, frame } = request;
        let image = Part::bytes(frame.bytes)
            .file_name(frame.filename)
            .mime_str(&frame.content_type)
            .map_err(|e| ClientError::Encode(e.to_string()))?;
        let mut form = Form::new().part(routes::IMAGE_FIELD, image);
        if let Some(reg_no) = target.reg_no() {
            form = form.text(routes::REG_NO_FIELD, reg_no.to_string());
        }

        let url = self.endpoint(&[target.route()])?;
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::TransportFailure(e.to_string()))?;
        Self::decode(response).await
    }

    pub async fn history(&self, reg_no: &str) -> ClientResult<Vec<AttendanceRecord>> {
        let url = self.endpoint(&[routes::GET_HISTORY, reg_no])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::TransportFailure(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::TransportFailure(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| {
                ClientError::TransportFailure(format!("undecodable gateway reply: {}", e))
            });
        }

        let message = serde_json::from_slice::<ErrorBody>(&body)
            .map(|reply| reply.message)
            .unwrap_or_else(|_| format!("gateway replied {}", status));
        if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
            Err(ClientError::BadRequest(message))
        } else {
            Err(ClientError::UpstreamUnavailable(message))
        }
    }
}

impl VerificationService for GatewayClient {
    fn verify(
        &self,
        request: SubmissionRequest,
    ) -> impl Future<Output = ClientResult<VerificationVerdict>> + Send {
        self.submit(request)
    }
}
