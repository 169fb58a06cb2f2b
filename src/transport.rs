//! Network boundary for the remote compressor.
//!
//! A [`Connector`] opens a [`Channel`] bound to one credential. Every response
//! is classified exactly once, here, into a [`Reply`]; nothing above this
//! module looks at status codes.

use crate::constants::{COMPRESSION_COUNT_HEADER, SERVICE_USER, SHRINK_PATH};
use crate::error::{CompressionError, Result};
use crate::keyring::Credential;
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::RequestBuilder;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Upload accepted; the result can be fetched from `locator`.
    Created { locator: String },
    /// Download payload.
    Body(Vec<u8>),
    /// Credential rejected or out of quota (401/429).
    Account { message: String },
    /// 5xx or a transport-level failure. `status` is `None` when no response arrived.
    Transient {
        status: Option<u16>,
        message: String,
    },
    /// Any other non-success; retrying will not help.
    Client {
        status: u16,
        kind: String,
        message: String,
    },
}

impl Reply {
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Reply::Transient {
            status: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ShrinkBody {
    output: Option<ShrinkOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct ShrinkOutput {
    url: Option<String>,
}

fn error_body(body: &[u8]) -> ErrorBody {
    serde_json::from_slice(body).unwrap_or_default()
}

/// Maps a raw response onto a [`Reply`].
pub fn classify(status: u16, location: Option<&str>, body: &[u8]) -> Reply {
    match status {
        201 => {
            let locator = location.map(str::to_owned).or_else(|| {
                serde_json::from_slice::<ShrinkBody>(body)
                    .ok()
                    .and_then(|b| b.output)
                    .and_then(|o| o.url)
            });
            match locator {
                Some(locator) => Reply::Created { locator },
                None => Reply::Client {
                    status,
                    kind: "MalformedResponse".to_string(),
                    message: "upload accepted without a result location".to_string(),
                },
            }
        }
        200..=299 => Reply::Body(body.to_vec()),
        401 | 429 => {
            let parsed = error_body(body);
            Reply::Account {
                message: parsed.message.unwrap_or_else(|| match status {
                    401 => "Credentials are invalid".to_string(),
                    _ => "Monthly compression limit reached".to_string(),
                }),
            }
        }
        500..=599 => {
            let parsed = error_body(body);
            Reply::Transient {
                status: Some(status),
                message: parsed
                    .message
                    .unwrap_or_else(|| format!("service returned HTTP {}", status)),
            }
        }
        _ => {
            let parsed = error_body(body);
            Reply::Client {
                status,
                kind: parsed.error.unwrap_or_else(|| "Unknown".to_string()),
                message: parsed
                    .message
                    .unwrap_or_else(|| format!("service returned HTTP {}", status)),
            }
        }
    }
}

/// One credential-bound connection to the service. Must allow many requests
/// in flight at once.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Lightweight call used to check the credential before a session starts.
    async fn validate(&self) -> Reply;
    async fn upload(&self, bytes: Vec<u8>) -> Reply;
    async fn download(&self, locator: &str) -> Reply;
}

pub trait Connector: Send + Sync {
    type Channel: Channel;

    fn open(&self, credential: &Credential) -> Result<Self::Channel>;
}

/// reqwest-backed connector for a TinyPNG-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                CompressionError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Connector for HttpConnector {
    type Channel = HttpChannel;

    fn open(&self, credential: &Credential) -> Result<HttpChannel> {
        Ok(HttpChannel {
            shrink_url: format!("{}{}", self.endpoint, SHRINK_PATH),
            client: self.client.clone(),
            credential: credential.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpChannel {
    shrink_url: String,
    client: reqwest::Client,
    credential: Credential,
}

impl HttpChannel {
    async fn send(&self, request: RequestBuilder) -> Reply {
        let response = match request
            .basic_auth(SERVICE_USER, Some(self.credential.secret()))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Reply::transport_failure(e.to_string()),
        };

        let status = response.status().as_u16();
        let headers = response.headers();
        if let Some(count) = headers
            .get(COMPRESSION_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            debug!(credential = %self.credential, count, "service compression count");
        }
        let location = headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        match response.bytes().await {
            Ok(body) => classify(status, location.as_deref(), &body),
            Err(e) => Reply::transport_failure(e.to_string()),
        }
    }
}

#[async_trait]
impl Channel for HttpChannel {
    async fn validate(&self) -> Reply {
        self.send(self.client.post(&self.shrink_url)).await
    }

    async fn upload(&self, bytes: Vec<u8>) -> Reply {
        self.send(self.client.post(&self.shrink_url).body(bytes)).await
    }

    async fn download(&self, locator: &str) -> Reply {
        self.send(self.client.get(locator)).await
    }
}
