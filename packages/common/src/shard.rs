use std::fmt;

use serde::Serialize;

/// Width of every rendered shard label.
pub const SHARD_LABEL_LEN: usize = 12;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 0x0100_0193;
const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A 12-character `[0-9a-z]` storage shard name.
///
/// Labels are never persisted; they are recomputed from the caller's credentials
/// on every request, so the same caller always lands in the same directory.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ShardLabel(String);

impl ShardLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ShardLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardLabel({})", self.0)
    }
}

impl fmt::Display for ShardLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShardLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deterministic (api key, owner) → shard placement.
///
/// The hash is 32-bit FNV-1a over the UTF-16 code units of
/// `api_key + owner_id + salt`. Changing any part of this transform moves
/// existing callers to new directories.
#[derive(Clone)]
pub struct ShardAssigner {
    salt: String,
}

impl ShardAssigner {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Compute the shard label for a caller.
    pub fn assign(&self, api_key: &str, owner_id: impl fmt::Display) -> ShardLabel {
        let combined = format!("{api_key}{owner_id}{}", self.salt);
        let hash = fnv1a_utf16(&combined);
        ShardLabel(render_label(hash))
    }
}

impl fmt::Debug for ShardAssigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Salt stays out of logs.
        f.debug_struct("ShardAssigner").finish_non_exhaustive()
    }
}

fn fnv1a_utf16(input: &str) -> u32 {
    input.encode_utf16().fold(FNV_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

fn render_label(mut value: u32) -> String {
    let mut digits = Vec::with_capacity(SHARD_LABEL_LEN);
    loop {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
        if value == 0 {
            break;
        }
    }
    while digits.len() < SHARD_LABEL_LEN {
        digits.push(b'0');
    }
    digits.reverse();
    digits.truncate(SHARD_LABEL_LEN);
    String::from_utf8_lossy(&digits).into_owned()
}
