use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

const TOKEN_LENGTH: usize = 48;

/// Random alphanumeric token suitable for an admin API key
pub fn generate_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(TOKEN_LENGTH).map(char::from).collect()
}

/// Lowercase hex SHA-256 of a token, the form stored in configuration
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Compare a presented token against a stored hash without early exit
pub fn verify_token(token: &str, expected_hash: &str) -> bool {
    let actual = hash_token(token);
    let expected = expected_hash.trim().to_ascii_lowercase();
    if actual.len() != expected.len() {
        return false;
    }
    actual.bytes().zip(expected.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
