//! Authentication hook for durable player tokens.
//!
//! Spyglass has no accounts. A client generates a random token once,
//! keeps it in local storage, and presents it on every create, join, and
//! rejoin. The [`Authenticator`] trait is where that token is turned into
//! a [`PlayerId`]; [`OpaqueTokenAuth`] is the default, which only checks
//! that the token is something sane to use as a map key.

use spyglass_protocol::PlayerId;

use crate::SessionError;

/// Validates a client's durable token and returns their identity.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use spyglass_protocol::PlayerId;
/// use spyglass_session::{Authenticator, SessionError};
///
/// /// Only lets in tokens minted by our own lobby page.
/// struct PrefixAuth;
///
/// impl Authenticator for PrefixAuth {
///     async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
///         token
///             .strip_prefix("lobby-")
///             .map(PlayerId::new)
///             .ok_or_else(|| SessionError::AuthFailed("unknown issuer".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the player's identity.
    ///
    /// # Errors
    /// Returns [`SessionError::AuthFailed`] if the token is rejected.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send;
}

/// Accepts any client-generated token of reasonable shape and uses it
/// verbatim as the player's identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueTokenAuth;

impl OpaqueTokenAuth {
    /// Longest token accepted, in characters.
    pub const MAX_TOKEN_LEN: usize = 128;
}

impl Authenticator for OpaqueTokenAuth {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
        if token.is_empty() {
            return Err(SessionError::AuthFailed("empty token".into()));
        }
        if token.chars().count() > Self::MAX_TOKEN_LEN {
            return Err(SessionError::AuthFailed("token too long".into()));
        }
        if token.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(SessionError::AuthFailed(
                "token contains whitespace or control characters".into(),
            ));
        }
        Ok(PlayerId::new(token))
    }
}
