//! IMAP client and the connection retry policy.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{MailboxAuthType, MailboxConfig};

use super::error::{MailboxError, Result};

/// Mailbox-assigned message identifier (an IMAP UID).
pub type MessageUid = u32;

/// Operations the ingestion cycle needs from a mailbox.
#[async_trait]
pub trait MailboxClient: Send {
    /// Opens a session: transport, authentication and read-only folder
    /// selection. A no-op when already connected.
    async fn connect(&mut self) -> Result<()>;

    /// Lists messages dated on or after `since` (day granularity), ascending.
    async fn list_since(&mut self, since: NaiveDate) -> Result<Vec<MessageUid>>;

    /// Fetches the raw RFC 822 bytes of one message without marking it read.
    async fn fetch(&mut self, uid: MessageUid) -> Result<Vec<u8>>;

    /// Closes the session. Failures are logged, never returned.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// Formats a date for an IMAP `SINCE` search, e.g. `05-Jan-2026`.
pub fn imap_since_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// Connects with exponential backoff.
///
/// Makes up to `attempts` attempts, sleeping `base_delay`, then twice that,
/// and so on between them. Errors that cannot be fixed by retrying end the
/// loop early. Returns the number of attempts used.
pub async fn connect_with_backoff<C>(
    client: &mut C,
    attempts: u32,
    base_delay: Duration,
) -> Result<u32>
where
    C: MailboxClient + ?Sized,
{
    let attempts = attempts.max(1);
    let mut delay = base_delay;
    let mut attempt = 1;

    loop {
        match client.connect().await {
            Ok(()) => {
                if attempt > 1 {
                    info!("Connected to mailbox on attempt {}", attempt);
                }
                return Ok(attempt);
            }
            Err(e) if !e.is_retryable() => {
                warn!("Mailbox connection failed permanently: {}", e);
                return Err(e);
            }
            Err(e) if attempt >= attempts => {
                return Err(MailboxError::RetriesExhausted {
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                warn!(
                    "Mailbox connection attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

type AsyncTcpStream = async_io::Async<TcpStream>;
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Single-shot authenticator for SASL XOAUTH2.
struct XOAuth2Authenticator {
    response: String,
}

impl async_imap::Authenticator for XOAuth2Authenticator {
    type Response = String;

    fn process(&mut self, _data: &[u8]) -> Self::Response {
        std::mem::take(&mut self.response)
    }
}

/// Builds the XOAUTH2 initial response: `user=<u>^Aauth=Bearer <t>^A^A`.
fn xoauth2_response(username: &str, token: &SecretString) -> String {
    let raw = format!(
        "user={}\x01auth=Bearer {}\x01\x01",
        username,
        token.expose_secret()
    );
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, raw.as_bytes())
}

/// IMAP-over-TLS implementation of [`MailboxClient`].
pub struct ImapClient {
    session: Option<Session<TlsStream>>,
    config: MailboxConfig,
}

impl ImapClient {
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            session: None,
            config,
        }
    }

    fn timeout_error(&self, operation: &'static str) -> MailboxError {
        MailboxError::Timeout {
            operation,
            seconds: self.config.timeout_secs,
        }
    }
}

/// Transport, TLS, authentication and read-only folder selection.
async fn open_session(
    config: &MailboxConfig,
    secret: SecretString,
) -> Result<Session<TlsStream>> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Connecting to IMAP server at {}", addr);

    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| MailboxError::ConnectionFailed(e.to_string()))?
        .next()
        .ok_or_else(|| {
            MailboxError::ConnectionFailed(format!("{} did not resolve to an address", addr))
        })?;

    let tcp_stream = AsyncTcpStream::connect(socket_addr)
        .await
        .map_err(|e| MailboxError::ConnectionFailed(e.to_string()))?;

    let tls_stream = TlsConnector::new()
        .connect(&config.host, tcp_stream)
        .await?;

    let client = async_imap::Client::new(tls_stream);

    let mut session = match config.auth.auth_type {
        MailboxAuthType::Password => client
            .login(&config.username, secret.expose_secret())
            .await
            .map_err(|(e, _)| MailboxError::AuthenticationFailed(e.to_string()))?,
        MailboxAuthType::OAuth2 => client
            .authenticate(
                "XOAUTH2",
                XOAuth2Authenticator {
                    response: xoauth2_response(&config.username, &secret),
                },
            )
            .await
            .map_err(|(e, _)| MailboxError::AuthenticationFailed(e.to_string()))?,
    };

    // EXAMINE keeps the folder read-only so fetched messages stay unseen.
    let folder = &config.folder;
    if let Err(e) = session.examine(folder).await {
        let message = e.to_string();
        if let Err(logout_err) = session.logout().await {
            debug!("Logout after failed EXAMINE also failed: {}", logout_err);
        }
        return Err(if message.contains("NO") || message.contains("doesn't exist") {
            MailboxError::FolderNotFound(folder.clone())
        } else {
            MailboxError::Protocol(message)
        });
    }

    Ok(session)
}

#[async_trait]
impl MailboxClient for ImapClient {
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        if !self.config.use_tls {
            return Err(MailboxError::Config(
                "TLS is required for mailbox connections".to_string(),
            ));
        }

        let (what, source) = self.config.auth.required_secret();
        let secret = source.resolve(what)?;

        let session = tokio::time::timeout(
            self.config.operation_timeout(),
            open_session(&self.config, secret),
        )
        .await
        .map_err(|_| self.timeout_error("connect"))??;

        info!(
            "Authenticated to {} and opened folder '{}'",
            self.config.host, self.config.folder
        );
        self.session = Some(session);
        Ok(())
    }

    async fn list_since(&mut self, since: NaiveDate) -> Result<Vec<MessageUid>> {
        let timeout = self.config.operation_timeout();
        let query = format!("SINCE {}", imap_since_date(since));
        let session = self.session.as_mut().ok_or(MailboxError::NotConnected)?;

        debug!("Searching with query: {}", query);
        let searched = tokio::time::timeout(timeout, session.uid_search(&query)).await;
        let uids = match searched {
            Ok(result) => result.map_err(|e| MailboxError::Protocol(e.to_string()))?,
            Err(_) => return Err(self.timeout_error("search")),
        };

        let mut uid_list: Vec<MessageUid> = uids.into_iter().collect();
        uid_list.sort_unstable();
        debug!("Found {} messages since {}", uid_list.len(), since);
        Ok(uid_list)
    }

    async fn fetch(&mut self, uid: MessageUid) -> Result<Vec<u8>> {
        let timeout = self.config.operation_timeout();
        let session = self.session.as_mut().ok_or(MailboxError::NotConnected)?;

        debug!("Fetching message with UID {}", uid);

        let fetched = tokio::time::timeout(timeout, async {
            let mut messages = session
                .uid_fetch(uid.to_string(), "BODY.PEEK[]")
                .await
                .map_err(|e| MailboxError::Protocol(e.to_string()))?;

            // Drain the stream so the session is ready for the next command.
            let mut body = None;
            while let Some(item) = messages.next().await {
                let message = item.map_err(|e| MailboxError::Protocol(e.to_string()))?;
                if body.is_none() {
                    body = message.body().map(|b| b.to_vec());
                }
            }
            body.ok_or(MailboxError::MessageNotFound(uid))
        })
        .await;

        match fetched {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error("fetch")),
        }
    }

    async fn disconnect(&mut self) {
        let timeout = self.config.operation_timeout();
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            match tokio::time::timeout(timeout, session.logout()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("IMAP logout failed: {}", e),
                Err(_) => warn!("IMAP logout timed out; dropping the session"),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapClient dropped without explicit disconnect - session will be closed");
        }
    }
}
