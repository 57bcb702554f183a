//! Common utilities for the cloudscale API client
//!
//! Provides the authenticated request plumbing shared by all resource calls.

pub mod query;

use crate::error::CloudscaleError;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// HTTP client wrapper with bearer authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from an API path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Make a GET request
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, CloudscaleError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(CloudscaleError::Http)?;

        let response = check_status("GET", path, response).await?;
        decode_body(path, response).await
    }

    /// Make a POST request
    pub async fn post<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CloudscaleError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(CloudscaleError::Http)?;

        let response = check_status("POST", path, response).await?;
        decode_body(path, response).await
    }

    /// Make a PATCH request
    ///
    /// cloudscale answers PATCH with `204 No Content`, so no body is decoded.
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), CloudscaleError> {
        let url = self.build_url(path);
        debug!("PATCH {}", url);

        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(CloudscaleError::Http)?;

        check_status("PATCH", path, response).await?;
        Ok(())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), CloudscaleError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(CloudscaleError::Http)?;

        check_status("DELETE", path, response).await?;
        Ok(())
    }
}

/// Map non-success responses onto [`CloudscaleError`]
async fn check_status(method: &str, path: &str, response: Response) -> Result<Response, CloudscaleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(CloudscaleError::NotFound(format!(
            "Resource not found: {} - {}",
            path, body
        ))),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CloudscaleError::Authentication(format!(
            "{} {} rejected: {} - {}",
            method, path, status, body
        ))),
        _ => Err(CloudscaleError::Api(format!(
            "{} {} failed: {} - {}",
            method, path, status, body
        ))),
    }
}

async fn decode_body<T: for<'de> Deserialize<'de>>(path: &str, response: Response) -> Result<T, CloudscaleError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        CloudscaleError::Api(format!(
            "error decoding response body of {}: {} - Response (first 500 chars): {}",
            path,
            e,
            text.chars().take(500).collect::<String>()
        ))
    })
}
