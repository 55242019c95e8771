//! HTTP client for the receipt extraction API

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ExtractionConfig;
use crate::traits::ExtractionService;
use crate::types::*;

const EXTRACT_RECEIPT_PATH: &str = "/extract-receipt";
const EXTRACT_CREDITOR_PATH: &str = "/extract-creditor";
const CONNECTION_TEST_PATH: &str = "/test-gemini";

/// Error body returned by the API on failure
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Body of the connection test endpoint
#[derive(Debug, Deserialize)]
struct ConnectionStatus {
    #[serde(default)]
    message: String,
}

/// Extraction service reached over HTTP with multipart image uploads
pub struct HttpExtractionClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpExtractionClient {
    pub fn new(config: &ExtractionConfig) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LedgerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => {
                tracing::warn!("No access token configured for extraction request");
                request
            }
        }
    }

    fn image_part(image: &ReceiptImage) -> Result<Part, ExtractionError> {
        Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|e| ExtractionError::MalformedPayload(format!("Invalid content type: {}", e)))
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ExtractionError> {
        let url = self.endpoint(path);
        let response = self
            .authorize(self.client.post(&url).multipart(form))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(%url, error = %e, "Extraction request failed");
                ExtractionError::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;
        interpret_response(status, &body)
    }
}

/// Map a status code and body to the decoded payload or an extraction error
fn interpret_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ExtractionError> {
    if status.is_success() {
        return serde_json::from_str(body)
            .map_err(|e| ExtractionError::MalformedPayload(e.to_string()));
    }

    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ExtractionError::Unauthorized(
            parsed
                .message
                .unwrap_or_else(|| "Unauthorized, please sign in".to_string()),
        ));
    }

    let message = parsed
        .message
        .unwrap_or_else(|| "Server communication error".to_string());
    let message = match parsed.details.or(parsed.error) {
        Some(details) if !details.is_empty() => format!("{}\n{}", message, details),
        _ => message,
    };
    tracing::error!(status = status.as_u16(), %message, "Extraction service rejected request");
    Err(ExtractionError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ExtractionService for HttpExtractionClient {
    async fn extract_receipt(
        &self,
        image: &ReceiptImage,
        known_creditors: &[Creditor],
    ) -> Result<ExtractedData, ExtractionError> {
        let mut form = Form::new().part("image", Self::image_part(image)?);
        if !known_creditors.is_empty() {
            let creditors = serde_json::to_string(known_creditors)
                .map_err(|e| ExtractionError::MalformedPayload(e.to_string()))?;
            form = form.text("creditors", creditors);
        }

        let data: ExtractedData = self.post_form(EXTRACT_RECEIPT_PATH, form).await?;
        tracing::debug!(
            amount = %data.amount,
            ref_number = %data.ref_number,
            "Receipt extracted"
        );
        Ok(data)
    }

    async fn extract_creditor_info(
        &self,
        image: &ReceiptImage,
    ) -> Result<CreditorInfo, ExtractionError> {
        let form = Form::new().part("image", Self::image_part(image)?);
        self.post_form(EXTRACT_CREDITOR_PATH, form).await
    }

    async fn check_connection(&self) -> Result<String, ExtractionError> {
        let url = self.endpoint(CONNECTION_TEST_PATH);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;
        let parsed: ConnectionStatus = interpret_response(status, &body)?;
        Ok(parsed.message)
    }
}
