//! Salted PBKDF2-HMAC-SHA512 password storage.
//!
//! Stored form is `salt || hex(derived)`: a 64 character hex salt followed by the
//! 128 character hex encoding of the derived key.

use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

pub const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 64;
const KEY_LEN: usize = 64;

pub fn hash_password(password: &str) -> String {
    let mut seed = [0u8; 60];
    rand::thread_rng().fill_bytes(&mut seed);
    let salt = hex::encode(Sha256::digest(seed));
    let derived = derive(password, salt.as_bytes());
    format!("{}{}", salt, hex::encode(derived))
}

pub fn verify_password(stored: &str, candidate: &str) -> bool {
    if stored.len() != SALT_LEN + KEY_LEN * 2 || !stored.is_ascii() {
        return false;
    }
    let (salt, expected_hex) = stored.split_at(SALT_LEN);
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    let derived = derive(candidate, salt.as_bytes());
    derived.as_slice().ct_eq(expected.as_slice()).into()
}

fn derive(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, ITERATIONS, &mut out);
    out
}
