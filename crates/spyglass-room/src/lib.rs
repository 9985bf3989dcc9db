//! Rooms for Spyglass.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! [`Room`] state machine and its round countdown.
//!
//! # Key types
//!
//! - [`Room`]: the synchronous state machine. Every operation returns the
//!   events it produced instead of sending them.
//! - [`RoomManager`]: creates and deletes rooms, routes players
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomStatus`]: `lobby`, `playing`, `results`
//! - [`RoomConfig`]: player limits, tick interval, channel size

mod catalog;
mod code;
mod config;
mod error;
mod manager;
mod room;
mod round;
mod settings;
mod state;
mod vote;

pub use catalog::{builtin_catalog, builtin_flat_catalog};
pub use code::{MAX_CODE_ATTEMPTS, generate_room_code, generate_unique_room_code};
pub use config::{RoomConfig, RoomStatus};
pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{PlayerSender, RoomAction, RoomHandle, RoomInfo};
pub use round::{
    REASON_ONLY_ROLE_HOLDERS, REASON_ROLE_HOLDERS_LEFT, REASON_TIMEOUT, RoundState, UNKNOWN_LOCATION,
};
pub use state::{
    Arrival, Departure, Events, HOST_LEFT_MESSAGE, MAX_NAME_LEN, Player, Room, display_name,
};
pub use vote::{TARGET_LEFT_MESSAGE, VOTE_REJECTED_MESSAGE, VoteState};
