//! HTTP upload client for the processing endpoint.
//!
//! Builds the multipart upload request (spreadsheet file plus the `headless`
//! form field) and hands back the response body as a byte stream. The remote
//! service is a black box: everything downstream of the returned stream is
//! the session's concern.

use bytes::Bytes;
use futures::Stream;
use reqwest::multipart;

use crate::{config::UploadConfig, error::SessionError};

/// Content type of the spreadsheet files the endpoint accepts.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// One upload request: the file and its processing flag.
#[derive(Clone)]
pub struct UploadPayload {
    /// File name reported to the endpoint.
    pub file_name: String,
    /// Raw spreadsheet bytes.
    pub contents: Vec<u8>,
    /// Whether the remote worker should run its browser headless.
    pub headless: bool,
}

/// Client for the upload endpoint.
#[derive(Clone, Debug)]
pub struct UploadClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
}

impl UploadClient {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Endpoint`] when the endpoint is not a valid
    /// URL.
    pub fn new(config: &UploadConfig) -> Result<Self, SessionError> {
        let endpoint =
            reqwest::Url::parse(&config.endpoint).map_err(|source| SessionError::Endpoint {
                url: config.endpoint.clone(),
                source: Box::new(source),
            })?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
        })
    }

    /// POST the payload and return the response body as a byte stream.
    ///
    /// The response status is checked before any body bytes are consumed: a
    /// non-success status fails the session up front.
    ///
    /// # Errors
    ///
    /// * [`SessionError::Transport`] when the request cannot be built or
    ///   sent.
    /// * [`SessionError::Status`] when the server responds with a
    ///   non-success status.
    pub async fn open_stream(
        &self,
        payload: UploadPayload,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static, SessionError>
    {
        tracing::debug!(
            endpoint = %self.endpoint,
            file = %payload.file_name,
            headless = payload.headless,
            size = payload.contents.len(),
            "issuing upload request"
        );

        let part = multipart::Part::bytes(payload.contents)
            .file_name(payload.file_name)
            .mime_str(XLSX_CONTENT_TYPE)
            .map_err(|source| SessionError::Transport(Box::new(source)))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("headless", payload.headless.to_string());

        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|source| SessionError::Transport(Box::new(source)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status { status });
        }

        Ok(response.bytes_stream())
    }
}
