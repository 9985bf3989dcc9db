//! Wire protocol for Spyglass.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`PlayerId`], [`RoomCode`], [`Settings`],
//!   [`LocationCatalog`], [`RosterEntry`]): the data carried by events.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`Envelope`]): the
//!   event catalog that travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those events are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding or
//!   validating wire data.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! layer. It doesn't know about rooms or rounds; it only knows what the
//! messages look like.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientEvent>) → Room
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, Envelope, ServerEvent};
pub use types::{
    LocationCatalog, LocationPack, MASKED_LOCATION, PlayerId, ROOM_CODE_ALPHABET, ROOM_CODE_LEN,
    Recipient, Role, RoomCode, RosterEntry, SettingKey, Settings, Winner,
};
