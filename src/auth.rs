//! Authentication service. Identity lives in the `AuthIdentity` session namespace, so the
//! service is rebuilt for every request and never cached.

use crate::dispatch::DispatchContext;
use crate::error::SessionError;
use crate::session::AUTH_NAMESPACE;
use serde_json::Value;
use std::sync::Arc;

/// Key inside [`AUTH_NAMESPACE`] holding the identity.
pub const IDENTITY_KEY: &str = "storage";

/// Checks a credential pair. Applications register one as a service.
pub trait CredentialVerifier: Send + Sync {
    /// The identity to store on success.
    fn verify(&self, identity: &str, credential: &str) -> Option<Value>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthResult {
    Success(Value),
    Failure,
}

impl AuthResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, AuthResult::Success(_))
    }
}

pub struct AuthenticationService {
    ctx: Arc<DispatchContext>,
}

impl AuthenticationService {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        AuthenticationService { ctx }
    }

    pub fn has_identity(&self) -> bool {
        self.identity().is_some()
    }

    pub fn identity(&self) -> Option<Value> {
        self.ctx
            .session()
            .lookup(AUTH_NAMESPACE, IDENTITY_KEY)
            .filter(|v| !v.is_null())
    }

    /// Verify and, on success, store the identity. The transport session id is rotated so a
    /// pre-login id cannot be replayed.
    pub fn authenticate(
        &self,
        verifier: &dyn CredentialVerifier,
        identity: &str,
        credential: &str,
    ) -> Result<AuthResult, SessionError> {
        let Some(found) = verifier.verify(identity, credential) else {
            tracing::debug!(identity, "authentication failed");
            return Ok(AuthResult::Failure);
        };
        if let Some(handle) = self.ctx.session().transport() {
            handle.regenerate();
        }
        self.ctx
            .session()
            .set(AUTH_NAMESPACE, IDENTITY_KEY, found.clone())?;
        tracing::info!(identity, "authenticated");
        Ok(AuthResult::Success(found))
    }

    pub fn clear_identity(&self) -> Result<(), SessionError> {
        self.ctx.session().clear(AUTH_NAMESPACE)
    }
}
