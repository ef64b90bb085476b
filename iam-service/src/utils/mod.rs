//! Identifier helpers.
//!
//! Records are addressed by `owner/name` composite ids throughout the service.

use rand::RngCore;
use uuid::Uuid;

/// Splits an `owner/name` id. Anything other than exactly two segments
/// yields `None`.
pub fn split_owner_name(id: &str) -> Option<(&str, &str)> {
    let mut parts = id.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) => Some((owner, name)),
        _ => None,
    }
}

pub fn join_owner_name(owner: &str, name: &str) -> String {
    format!("{}/{}", owner, name)
}

/// Random record name.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// 20 hex characters, the shape used for client ids and authorization codes.
pub fn generate_client_id() -> String {
    random_hex(10)
}

/// 40 hex characters.
pub fn generate_client_secret() -> String {
    random_hex(20)
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
