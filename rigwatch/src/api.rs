//! REST client for the device registry backend.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::session::Session;
use crate::types::{
    device_list, DeviceRequest, DeviceSnapshot, LoginRequest, LoginResponse, Message, NoteRequest,
    OneOrMany, RegisterRequest,
};

pub const DEFAULT_API_URL: &str = "https://localhost:7117/api/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend answered {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("bad url: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Invalid(&'static str),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        // join() drops the last path segment unless the base ends with '/'
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("rigwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.base.join(path)?;
        debug!(%method, %url, "api request");
        Ok(self.http.request(method, url))
    }

    fn authed(
        &self,
        session: &Session,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, ApiError> {
        Ok(self
            .request(method, path)?
            .header(reqwest::header::AUTHORIZATION, session.bearer()))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let resp = self
            .request(Method::POST, "Auth/login")?
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let body: LoginResponse = decode(check(resp).await?).await?;
        if let Some(msg) = body.message.as_deref() {
            debug!(user = username, msg, "login accepted");
        }
        Ok(Session::new(username, body.token))
    }

    /// Returns the backend's confirmation text.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        let resp = self
            .request(Method::POST, "Auth/register")?
            .json(&RegisterRequest {
                username,
                email,
                password,
            })
            .send()
            .await?;
        Ok(message_of(&check(resp).await?.text().await?))
    }

    /// All devices of the session's user with their current telemetry.
    pub async fn fetch_devices(&self, session: &Session) -> Result<Vec<DeviceSnapshot>, ApiError> {
        let path = format!("Device/GetDeviceInfo/{}", session.username);
        let resp = self.authed(session, Method::GET, &path)?.send().await?;
        let listing: Option<OneOrMany<serde_json::Value>> = decode(check(resp).await?).await?;
        Ok(device_list(listing))
    }

    pub async fn device_ids(&self, session: &Session) -> Result<Vec<String>, ApiError> {
        let path = format!("Device/GetDevices/{}", session.username);
        let resp = self.authed(session, Method::GET, &path)?.send().await?;
        let ids: OneOrMany<String> = decode(check(resp).await?).await?;
        Ok(ids.into())
    }

    pub async fn add_device(&self, session: &Session, device_id: &str) -> Result<(), ApiError> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(ApiError::Invalid("device id cannot be empty"));
        }
        let resp = self
            .authed(session, Method::POST, "Device/AddDevice")?
            .json(&DeviceRequest {
                username: &session.username,
                device_id,
            })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn delete_device(&self, session: &Session, device_id: &str) -> Result<(), ApiError> {
        let resp = self
            .authed(session, Method::DELETE, "Device/DeleteDevice")?
            .json(&DeviceRequest {
                username: &session.username,
                device_id,
            })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn messages(&self, session: &Session, device_id: &str) -> Result<Vec<Message>, ApiError> {
        let path = format!("messages/{device_id}");
        let resp = self.authed(session, Method::GET, &path)?.send().await?;
        // an empty thread may come back as 404
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        decode(check(resp).await?).await
    }

    /// Send a message from the IT side.
    pub async fn send_message(
        &self,
        session: &Session,
        device_id: &str,
        device_name: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::Invalid("message cannot be empty"));
        }
        let msg = Message {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            content: content.to_string(),
            message_date: Some(chrono::Utc::now()),
            is_message_it: true,
        };
        let resp = self
            .authed(session, Method::POST, "messages")?
            .json(&msg)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn clear_messages(&self, session: &Session, device_id: &str) -> Result<(), ApiError> {
        let path = format!("messages/{device_id}");
        let resp = self.authed(session, Method::DELETE, &path)?.send().await?;
        check(resp).await?;
        Ok(())
    }

    /// The device's note, if it has one.
    pub async fn note(&self, session: &Session, device_id: &str) -> Result<Option<String>, ApiError> {
        let path = format!("Donanim/GetNote/{device_id}");
        let resp = self.authed(session, Method::GET, &path)?.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let notes: OneOrMany<String> = decode(check(resp).await?).await?;
        Ok(Vec::from(notes).into_iter().next())
    }

    pub async fn save_note(&self, session: &Session, device_id: &str, note: &str) -> Result<(), ApiError> {
        let resp = self
            .authed(session, Method::POST, "Donanim/SaveNote")?
            .json(&NoteRequest {
                device_id,
                note,
                date_created: chrono::Utc::now(),
            })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

// Map non-success statuses to ApiError::Status, keeping the backend's message.
async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        message_of(&body)
    };
    Err(ApiError::Status { status, message })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// `{"message": "..."}` bodies yield the message, anything else the raw text.
fn message_of(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
