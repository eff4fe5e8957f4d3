//! Canonical CBOR encoding and SHA-256 record identifiers.

use std::fmt;

use serde::Serialize;
use serde_cbor::{ser::Write as CborWrite, value::Value as CborValue};
use sha2::{Digest, Sha256};
use sr_contracts::ShardContractRecord;

pub const ID_PREFIX: &str = "sha256:";

const FILE_EXTENSION: &str = "cbor";

/// Serialize a value into canonical CBOR bytes (sorted map keys, self-describe tag).
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    let mut buf = Vec::with_capacity(256);
    write_canonical_cbor(value, &mut buf)?;
    Ok(buf)
}

pub fn write_canonical_cbor<T: Serialize, W>(value: &T, writer: W) -> Result<(), serde_cbor::Error>
where
    W: CborWrite,
{
    // Going through `Value` sorts map keys into RFC 8949 order.
    let canonical: CborValue = serde_cbor::value::to_value(value)?;
    let mut serializer = serde_cbor::ser::Serializer::new(writer);
    serializer.self_describe()?;
    canonical.serialize(&mut serializer)
}

pub(crate) fn sha256(bytes: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Stable identifier of a stored record, derived from its `(hash, farmer_id)` key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; 32]);

impl RecordId {
    pub fn for_key(hash: &str, farmer_id: &str) -> Result<Self, serde_cbor::Error> {
        let bytes = to_canonical_cbor(&(hash, farmer_id))?;
        Ok(Self(sha256(&bytes)))
    }

    pub fn for_record(record: &ShardContractRecord) -> Result<Self, serde_cbor::Error> {
        Self::for_key(&record.hash, record.farmer_id())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as a `sha256:...` hex string.
    pub fn to_hex(&self) -> String {
        format!("{ID_PREFIX}{}", hex::encode(self.0))
    }

    pub(crate) fn file_name(&self) -> String {
        format!("{}.{FILE_EXTENSION}", hex::encode(self.0))
    }

    /// Parse the id back out of a record file name; `None` for anything else
    /// found in a shard directory (temp files, stray entries).
    pub(crate) fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(FILE_EXTENSION)?.strip_suffix('.')?;
        let mut buf = [0u8; 32];
        hex::decode_to_slice(stem, &mut buf).ok()?;
        Some(Self(buf))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordId").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl serde::Serialize for RecordId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
