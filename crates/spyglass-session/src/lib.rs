//! Player identity for Spyglass.
//!
//! A connection is not a player. Phones lock, tabs reload, Wi-Fi drops,
//! and every time that happens the client comes back on a brand-new
//! connection. This crate keeps the two apart:
//!
//! 1. **Authentication** turns the client's durable token into a
//!    [`PlayerId`](spyglass_protocol::PlayerId) ([`Authenticator`] trait).
//! 2. **Binding** records which connection currently speaks for which
//!    player ([`SessionManager`]), so a newer connection displaces an older
//!    one and a stale connection can never act or disconnect anybody.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← resolves the sender of every event through here
//!     ↕
//! Session Layer (this crate)  ← PlayerId ⇄ ConnectionId
//!     ↕
//! Protocol / Transport (below)  ← PlayerId, ConnectionId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{Authenticator, OpaqueTokenAuth};
pub use error::SessionError;
pub use manager::{Binding, SessionManager};
pub use session::{Session, SessionConfig, SessionState};
