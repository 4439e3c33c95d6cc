//! Session state: the transport session handle, its store, and the per-request mirror.

pub mod handle;
pub mod mirror;

pub use handle::{is_expired, parse_cookie, MemorySessionStore, SessionData, SessionHandle, SessionStore};
pub use mirror::{ProcessMirror, SessionMirror, Tier, RESERVED_KEYS};

/// Namespace holding the authenticated identity.
pub const AUTH_NAMESPACE: &str = "AuthIdentity";
/// Namespace holding queued flash messages.
pub const FLASH_NAMESPACE: &str = "FlashMessenger";
/// Namespace holding CSRF tokens.
pub const SECURITY_NAMESPACE: &str = "security";
