//! Session-bound client for a remote compression service.
//!
//! A session binds one credential from the [`KeyRing`] to one [`Channel`].
//! `compress` only needs `&self`, so any number of files can be in flight on
//! the session at once; creating, closing or retiring a session needs
//! `&mut self` and therefore cannot overlap with in-flight work.

use crate::config::{RemoteOptions, RetryPolicy};
use crate::error::{CompressionError, Result};
use crate::formats::{ensure_supported, MediaType, REMOTE_SUPPORTED};
use crate::keyring::{Credential, KeyRing};
use crate::report::Reporter;
use crate::transport::{Channel, Connector, Reply};
use crate::utils::output_path_for;
use futures::future::BoxFuture;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub enum SessionState<Ch> {
    Uninitialized,
    Validating,
    Active { credential: Credential, channel: Ch },
    Closed,
}

impl<Ch> SessionState<Ch> {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Validating => "validating",
            SessionState::Active { .. } => "active",
            SessionState::Closed => "closed",
        }
    }
}

/// Result of one confirmed remote compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub input_bytes: u64,
    pub output_bytes: u64,
}

pub struct RemoteCompressor<C: Connector> {
    connector: C,
    keys: KeyRing,
    state: SessionState<C::Channel>,
    output_dir: Option<PathBuf>,
    retry: RetryPolicy,
    reporter: Reporter,
    output_ready: AtomicBool,
}

impl<C: Connector> RemoteCompressor<C> {
    pub fn new(connector: C, options: RemoteOptions) -> Self {
        Self {
            connector,
            keys: options.keys,
            state: SessionState::Uninitialized,
            output_dir: options.output_dir,
            retry: options.retry,
            reporter: Reporter::default(),
            output_ready: AtomicBool::new(false),
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn state(&self) -> &SessionState<C::Channel> {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    pub fn active_credential(&self) -> Option<&Credential> {
        match &self.state {
            SessionState::Active { credential, .. } => Some(credential),
            _ => None,
        }
    }

    pub fn supported_types(&self) -> &'static [MediaType] {
        REMOTE_SUPPORTED
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        ensure_supported(path, REMOTE_SUPPORTED).is_ok()
    }

    /// Opens a session on the next usable credential.
    ///
    /// Credentials rejected by the service are deleted from the ring and the
    /// next one is tried; transient failures are retried per the retry policy
    /// and then abort. Fails with [`CompressionError::RingExhausted`] once no
    /// credential is left.
    pub async fn create_session(&mut self) -> Result<Credential> {
        self.close_session();

        'credentials: loop {
            let credential = self.keys.next()?;
            self.state = SessionState::Validating;
            let channel = self.connector.open(&credential)?;

            let mut attempt = 1;
            loop {
                match channel.validate().await {
                    Reply::Account { message } => {
                        warn!(credential = %credential, %message, "credential rejected, removing it");
                        self.reporter
                            .error(&format!("Credential {} rejected: {}", credential, message));
                        self.keys.delete(Some(&credential));
                        self.state = SessionState::Closed;
                        continue 'credentials;
                    }
                    Reply::Transient { status, message } => {
                        if attempt >= self.retry.attempts() {
                            self.state = SessionState::Closed;
                            return Err(CompressionError::Server {
                                attempts: attempt,
                                message,
                            });
                        }
                        debug!(credential = %credential, ?status, attempt, "validation failed transiently, retrying");
                        tokio::time::sleep(self.retry.delay).await;
                        attempt += 1;
                    }
                    _ => {
                        info!(credential = %credential, "session active");
                        self.state = SessionState::Active {
                            credential: credential.clone(),
                            channel,
                        };
                        return Ok(credential);
                    }
                }
            }
        }
    }

    /// Drops the channel. Returns the credential the session was bound to.
    pub fn close_session(&mut self) -> Option<Credential> {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        match previous {
            SessionState::Active { credential, .. } => {
                debug!(credential = %credential, "session closed");
                Some(credential)
            }
            SessionState::Uninitialized => {
                self.state = SessionState::Uninitialized;
                None
            }
            _ => None,
        }
    }

    /// Closes the session and deletes its credential from the ring.
    pub fn retire_session(&mut self) -> Option<Credential> {
        let credential = self.close_session()?;
        self.keys.delete(Some(&credential));
        Some(credential)
    }

    /// Deletes `credential`, closing the session first when it is bound to it.
    pub fn retire_credential(&mut self, credential: &Credential) -> bool {
        if self.active_credential() == Some(credential) {
            self.close_session();
        }
        self.keys.delete(Some(credential))
    }

    /// Uploads `source`, downloads the result and writes it to the output path.
    pub async fn compress(&self, source: &Path) -> Result<RemoteOutcome> {
        let SessionState::Active {
            credential,
            channel,
        } = &self.state
        else {
            return Err(CompressionError::SessionNotActive);
        };
        ensure_supported(source, REMOTE_SUPPORTED)?;

        let bytes = tokio::fs::read(source).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => CompressionError::FileNotFound(source.to_path_buf()),
            _ => CompressionError::Io(e),
        })?;
        let input_bytes = bytes.len() as u64;

        let locator = match self
            .request(credential, move || channel.upload(bytes.clone()))
            .await?
        {
            Reply::Created { locator } => locator,
            other => return Err(unexpected(other)),
        };

        let locator = locator.as_str();
        let compressed = match self
            .request(credential, move || channel.download(locator))
            .await?
        {
            Reply::Body(compressed) => compressed,
            other => return Err(unexpected(other)),
        };

        let output = output_path_for(source, self.output_dir.as_deref())?;
        self.ensure_output_dir().await?;
        tokio::fs::write(&output, &compressed).await?;

        let output_bytes = compressed.len() as u64;
        debug!(file = %source.display(), input_bytes, output_bytes, "remote compression done");
        self.reporter.record_success(source, input_bytes, output_bytes);

        Ok(RemoteOutcome {
            source: source.to_path_buf(),
            output,
            input_bytes,
            output_bytes,
        })
    }

    /// Sends a request, retrying transient failures with a fixed delay.
    async fn request<'a, F>(&self, credential: &Credential, mut send: F) -> Result<Reply>
    where
        F: FnMut() -> BoxFuture<'a, Reply>,
    {
        let mut attempt = 1;
        loop {
            match send().await {
                Reply::Transient { status, message } => {
                    if attempt >= self.retry.attempts() {
                        return Err(CompressionError::Server {
                            attempts: attempt,
                            message,
                        });
                    }
                    debug!(?status, attempt, %message, "transient service failure, retrying");
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Reply::Account { message } => {
                    return Err(CompressionError::Account {
                        credential: credential.clone(),
                        message,
                    })
                }
                Reply::Client {
                    status,
                    kind,
                    message,
                } => {
                    return Err(CompressionError::Client {
                        status,
                        kind,
                        message,
                    })
                }
                reply => return Ok(reply),
            }
        }
    }

    async fn ensure_output_dir(&self) -> Result<()> {
        let Some(dir) = &self.output_dir else {
            return Ok(());
        };
        if !self.output_ready.load(Ordering::Acquire) {
            tokio::fs::create_dir_all(dir).await?;
            self.output_ready.store(true, Ordering::Release);
        }
        Ok(())
    }
}

fn unexpected(reply: Reply) -> CompressionError {
    let kind = match reply {
        Reply::Created { .. } => "UnexpectedCreated",
        _ => "UnexpectedBody",
    };
    CompressionError::Client {
        status: 200,
        kind: kind.to_string(),
        message: "service answered with an unexpected response".to_string(),
    }
}
