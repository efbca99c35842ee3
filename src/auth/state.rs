//! Anti-forgery state values for the authorization redirect

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

/// Number of random bytes behind every state value
pub const STATE_BYTES: usize = 32;

/// Generate a fresh state value: 32 bytes from the OS-seeded RNG, standard
/// base64 encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}
