//! Mailbox error types.

use thiserror::Error;

/// Errors that can occur while talking to the mailbox server.
#[derive(Error, Debug)]
pub enum MailboxError {
    /// Failed to open the TCP connection.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The password or access token could not be resolved.
    #[error("Credentials not available: {0}")]
    Credentials(#[from] crate::secrets::SecretError),

    /// IMAP protocol error.
    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    /// The configured folder does not exist.
    #[error("IMAP folder '{0}' not found")]
    FolderNotFound(String),

    /// An operation was attempted without an open session.
    #[error("Not connected to the IMAP server")]
    NotConnected,

    /// The server returned no body for a UID.
    #[error("Message with UID {0} not found")]
    MessageNotFound(u32),

    /// Invalid configuration.
    #[error("Invalid mailbox configuration: {0}")]
    Config(String),

    /// A network operation did not finish in time.
    #[error("Mailbox operation '{operation}' timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// Every connection attempt failed.
    #[error("Giving up after {attempts} connection attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<MailboxError>,
    },
}

impl MailboxError {
    /// Whether another connection attempt could succeed.
    ///
    /// Configuration and credential problems will not fix themselves.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            MailboxError::Config(_) | MailboxError::Credentials(_) | MailboxError::FolderNotFound(_)
        )
    }
}

impl From<async_native_tls::Error> for MailboxError {
    fn from(err: async_native_tls::Error) -> Self {
        MailboxError::Tls(err.to_string())
    }
}

/// Result type for mailbox operations.
pub type Result<T> = std::result::Result<T, MailboxError>;
