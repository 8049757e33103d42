//! Datastore layout of provider records.
//!
//! Every (content key, provider) observation is stored as its own entry:
//!
//! ```text
//! /providers/<base32(content key)>/<base32(peer id)>  ->  varint(unix nanos)
//! ```
//!
//! Base32 is the RFC 4648 alphabet without padding, which never produces a
//! `/`, so the separator can't appear inside an encoded segment.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use data_encoding::BASE32_NOPAD;

use crate::common::PeerId;

/// The prefix/namespace for ALL provider record keys stored in the datastore.
pub const PROVIDERS_KEY_PREFIX: &str = "/providers/";

/// Upper bound of an encoded timestamp's length.
pub const MAX_TIMESTAMP_SIZE: usize = 16;

/// Maximum length of a varint-encoded 64-bit integer.
const MAX_VARINT_LEN_64: usize = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a stored provider record can't be decoded.
pub enum CodecError {
    /// The buffer ended before the varint did.
    #[error("truncated timestamp varint")]
    Truncated,

    /// The varint doesn't fit in 64 bits.
    #[error("timestamp varint overflows 64 bits")]
    Overflow,

    /// The timestamp can't be represented as a [SystemTime].
    #[error("timestamp {0} out of range")]
    OutOfRange(i64),

    /// The last segment of a record key isn't valid base32.
    #[error("invalid base32 peer id in record key {0:?}")]
    InvalidPeerId(String),
}

/// Key of the record for provider `peer` of `key`.
pub fn record_key(key: &[u8], peer: &PeerId) -> String {
    let mut record_key = prefix_key(key);
    record_key.push('/');
    record_key.push_str(&BASE32_NOPAD.encode(peer.as_bytes()));

    record_key
}

/// Namespace of all the provider records of `key`.
pub fn prefix_key(key: &[u8]) -> String {
    let mut prefix = String::with_capacity(PROVIDERS_KEY_PREFIX.len() + key.len() * 8 / 5 + 1);
    prefix.push_str(PROVIDERS_KEY_PREFIX);
    prefix.push_str(&BASE32_NOPAD.encode(key));

    prefix
}

/// Prefix to scan for all the providers of `key`.
///
/// Ends with the separator so that scanning one key never matches another key
/// whose encoding merely starts with the same characters.
pub fn scan_prefix(key: &[u8]) -> String {
    let mut prefix = prefix_key(key);
    prefix.push('/');

    prefix
}

/// Recovers the provider's [PeerId] from the last segment of a record key.
pub fn peer_id_from_record_key(record_key: &str) -> Result<PeerId, CodecError> {
    let encoded = record_key.rsplit('/').next().unwrap_or_default();

    BASE32_NOPAD
        .decode(encoded.as_bytes())
        .map(PeerId::from)
        .map_err(|_| CodecError::InvalidPeerId(record_key.to_string()))
}

/// Encodes `time` as the zig-zag varint of its nanoseconds since the Unix epoch.
pub fn encode_timestamp(time: SystemTime) -> Vec<u8> {
    let nanos = to_unix_nanos(time);

    let mut unsigned = (nanos as u64) << 1;
    if nanos < 0 {
        unsigned = !unsigned;
    }

    let mut buf = Vec::with_capacity(MAX_VARINT_LEN_64);
    while unsigned >= 0x80 {
        buf.push(unsigned as u8 | 0x80);
        unsigned >>= 7;
    }
    buf.push(unsigned as u8);

    buf
}

/// Decodes a timestamp written by [encode_timestamp].
///
/// Trailing bytes after the varint are ignored.
pub fn decode_timestamp(data: &[u8]) -> Result<SystemTime, CodecError> {
    let mut unsigned: u64 = 0;
    let mut shift = 0;

    for (i, byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN_64 {
            return Err(CodecError::Overflow);
        }

        if *byte < 0x80 {
            if i == MAX_VARINT_LEN_64 - 1 && *byte > 1 {
                return Err(CodecError::Overflow);
            }

            unsigned |= (*byte as u64) << shift;

            let mut nanos = (unsigned >> 1) as i64;
            if unsigned & 1 != 0 {
                nanos = !nanos;
            }

            return from_unix_nanos(nanos);
        }

        unsigned |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    Err(CodecError::Truncated)
}

fn to_unix_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos())
            .map(|nanos| -nanos)
            .unwrap_or(i64::MIN),
    }
}

fn from_unix_nanos(nanos: i64) -> Result<SystemTime, CodecError> {
    let time = if nanos >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_nanos(nanos as u64))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_nanos(nanos.unsigned_abs()))
    };

    time.ok_or(CodecError::OutOfRange(nanos))
}
