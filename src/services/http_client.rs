use crate::config::Config;
use crate::error::Error;
use crate::services::retry::FetchError;
use log::info;
use reqwest::{Client, Response, StatusCode};

pub fn create_http_client(config: &Config) -> Result<Client, Error> {
    info!(
        "Creating HTTP client (timeout {:?})",
        config.request_timeout
    );
    Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!("flow-stakeout/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))
}

/// Rate limiting and server-side failures are expected to clear up on their own.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Reads the body, refusing anything larger than `max_bytes`.
pub async fn read_capped(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(FetchError::Fatal(oversized(max_bytes)));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::Transient(e.to_string()))?
    {
        if body.len() + chunk.len() > max_bytes {
            return Err(FetchError::Fatal(oversized(max_bytes)));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn oversized(max_bytes: usize) -> Error {
    Error::decode(format!("response exceeds {max_bytes} bytes"))
}
