//! NiFi REST client
//!
//! Thin authenticated JSON client over the NiFi REST API. It owns the access
//! token and folds transport failures and HTTP statuses into
//! [`OrchestrationError`].

use crate::config::{NifiConfig, Secret};
use crate::nifi::types::Revision;
use crate::orchestration::error::OrchestrationError;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Authenticated NiFi REST client
pub struct NifiClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: Secret,
    client_id: String,
    token: RwLock<Option<String>>,
}

impl NifiClient {
    /// Build a client from configuration; no request is sent yet
    pub fn new(config: &NifiConfig) -> Result<Self, OrchestrationError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                OrchestrationError::InvalidConfiguration(format!(
                    "Failed to build NiFi HTTP client: {}",
                    e
                ))
            })?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            client_id: Uuid::new_v4().to_string(),
            token: RwLock::new(None),
        })
    }

    /// Identifier sent with every revisioned mutation
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Revision for a new component
    pub fn initial_revision(&self) -> Revision {
        Revision {
            version: 0,
            client_id: Some(self.client_id.clone()),
        }
    }

    /// Revision to send when mutating a component last seen at `current`
    pub fn revision(&self, current: &Revision) -> Revision {
        Revision {
            version: current.version,
            client_id: Some(self.client_id.clone()),
        }
    }

    /// Exchange the configured credentials for a fresh access token
    pub async fn login(&self) -> Result<(), OrchestrationError> {
        let url = format!("{}/access/token", self.base_url);
        tracing::debug!(url = %url, username = %self.username, "Requesting NiFi access token");

        let response = self
            .http
            .post(&url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.expose()),
            ])
            .send()
            .await
            .map_err(|e| transport_error("POST", "/access/token", e))?;

        let response = check_status(response, "POST", "/access/token").await?;
        let token = response
            .text()
            .await
            .map_err(|e| transport_error("POST", "/access/token", e))?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(OrchestrationError::EngineRejected(
                "NiFi returned an empty access token".to_string(),
            ));
        }

        *self.token.write().await = Some(token);
        Ok(())
    }

    /// `GET` a JSON resource
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, OrchestrationError> {
        let response = self.send(Method::GET, path, |req| req).await?;
        decode(response, "GET", path).await
    }

    /// `POST` a JSON body and decode the reply
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, OrchestrationError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, |req| req.json(body)).await?;
        decode(response, "POST", path).await
    }

    /// `PUT` a JSON body and decode the reply
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, OrchestrationError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::PUT, path, |req| req.json(body)).await?;
        decode(response, "PUT", path).await
    }

    /// `DELETE` a revisioned component
    pub async fn delete(&self, path: &str, revision: &Revision) -> Result<(), OrchestrationError> {
        let version = revision.version.to_string();
        self.send(Method::DELETE, path, |req| {
            req.query(&[
                ("version", version.as_str()),
                ("clientId", self.client_id.as_str()),
            ])
        })
        .await?;
        Ok(())
    }

    async fn send<F>(&self, method: Method, path: &str, build: F) -> Result<Response, OrchestrationError>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{}", self.base_url, path);
        let verb = method.as_str().to_string();
        tracing::debug!(method = %verb, url = %url, "NiFi request");

        let mut request = self.http.request(method, &url);
        if let Some(token) = self.token.read().await.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = build(request)
            .send()
            .await
            .map_err(|e| transport_error(&verb, path, e))?;
        check_status(response, &verb, path).await
    }
}

fn transport_error(method: &str, path: &str, error: reqwest::Error) -> OrchestrationError {
    tracing::warn!(method = %method, path = %path, error = %error, "NiFi request failed");
    OrchestrationError::EngineUnreachable(format!("{} {}: {}", method, path, error))
}

async fn check_status(
    response: Response,
    method: &str,
    path: &str,
) -> Result<Response, OrchestrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    tracing::error!(
        method = %method,
        path = %path,
        status_code = status.as_u16(),
        error_body = %body,
        "NiFi returned error status"
    );

    let message = format!("{} {} returned {}: {}", method, path, status.as_u16(), body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(OrchestrationError::EngineUnreachable(message))
    } else {
        Err(OrchestrationError::EngineRejected(message))
    }
}

async fn decode<T: DeserializeOwned>(
    response: Response,
    method: &str,
    path: &str,
) -> Result<T, OrchestrationError> {
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(method, path, e))?;
    serde_json::from_str(&body).map_err(|e| {
        OrchestrationError::EngineRejected(format!(
            "{} {} returned an unexpected body: {}",
            method, path, e
        ))
    })
}
