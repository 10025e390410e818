use std::path::PathBuf;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `grouplock`.
///
/// Each subsystem defines its own error variant. The session lifecycle matches
/// on these to decide whether a failure is fatal (credentials) or routes back
/// into the reconnect loop (transport). Internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum LockError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Credential state ────────────────────────────────────────────────
    #[error("credentials: {0}")]
    Credential(#[from] CredentialError),

    // ── Policy store ────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Transport / session ─────────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Credential errors ───────────────────────────────────────────────────────

/// Failures reading the durable credential state. All of these are fatal:
/// there is no fallback login path without credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential file {path} not found")]
    Missing { path: PathBuf },

    #[error("failed reading credential file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {path} is not valid JSON: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("credential file {path} must contain a JSON array of cookie records")]
    NotAnArray { path: PathBuf },
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed reading policy store {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("policy store {path} is malformed: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed writing policy store {path}: {message}")]
    Write { path: PathBuf, message: String },
}

// ─── Transport errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote session is gone. Callers treat this as a forced-reconnect
    /// signal.
    #[error("session disconnected: {0}")]
    Disconnected(String),

    #[error("login failed: {0}")]
    Login(String),

    #[error("request {operation} failed: {message}")]
    Request { operation: String, message: String },

    #[error("unexpected response for {operation}: {message}")]
    Decode { operation: String, message: String },
}

impl TransportError {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

/// Returns `true` when `error` (or anything it wraps) is a transport-level
/// disconnect.
pub fn is_disconnect(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<TransportError>()
            .is_some_and(TransportError::is_disconnect)
    })
}

// ─── Convenience Result alias ────────────────────────────────────────────────

pub type LockResult<T> = std::result::Result<T, LockError>;
