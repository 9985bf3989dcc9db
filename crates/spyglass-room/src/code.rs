//! Room code generation.

use rand::Rng;
use spyglass_protocol::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode};

/// How many random codes to try before giving up. With 36^4 possible
/// codes this only runs out when the server is absurdly full.
pub const MAX_CODE_ATTEMPTS: usize = 64;

/// Draws a random room code.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> Option<RoomCode> {
    let alphabet = ROOM_CODE_ALPHABET.as_bytes();
    let raw: String = (0..ROOM_CODE_LEN)
        .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
        .collect();
    RoomCode::parse(&raw).ok()
}

/// Draws codes until one isn't taken, up to [`MAX_CODE_ATTEMPTS`] times.
pub fn generate_unique_room_code<R, F>(rng: &mut R, is_taken: F) -> Option<RoomCode>
where
    R: Rng + ?Sized,
    F: Fn(&RoomCode) -> bool,
{
    (0..MAX_CODE_ATTEMPTS)
        .filter_map(|_| generate_room_code(rng))
        .find(|code| !is_taken(code))
}
