use thiserror::Error;

/// Result type for msgenvelope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while provisioning keys or sealing/opening payloads
#[derive(Error, Debug)]
pub enum Error {
    /// The backend tag is reserved, unknown, or not registered with the provisioner
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// A shared-secret operation was requested without a raw key
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// Key material of an unusable length or shape
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The remote key-management service failed, refused, or timed out
    #[error("Key management service unavailable: {0}")]
    BackendUnavailable(String),

    /// The wrapped-key metadata could not be decoded
    #[error("Corrupt envelope: {0}")]
    CorruptEnvelope(String),

    /// The ciphertext is too short or otherwise not shaped like sealed output
    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// The integrity tag did not verify.
    ///
    /// Carries no detail on purpose; nothing about the plaintext is reported.
    #[error("Authentication failure")]
    AuthenticationFailure,

    /// The supplied shared key does not match the fingerprint carried by the handle
    #[error("Shared key does not match envelope fingerprint")]
    KeyMismatch,

    /// Invalid configuration or argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure inside a cryptographic primitive while sealing
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl Error {
    /// Classifies a failure coming back from a key-management service call.
    ///
    /// Every such failure is reported as `BackendUnavailable`, keeping the original message.
    pub fn remote(err: Error) -> Error {
        match err {
            Error::BackendUnavailable(_) => err,
            other => Error::BackendUnavailable(other.to_string()),
        }
    }
}
