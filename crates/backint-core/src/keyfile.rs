// SPDX-License-Identifier: MIT OR Apache-2.0
//! Encryption key file loading.

use crate::error::EngineError;
use serde::Deserialize;

/// How the key bytes in an [`EncryptionKeyEntry`] are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyType {
    /// Raw base64-encoded key bytes, used verbatim as a CSEK.
    Raw,
    /// Key bytes are RSA-encrypted and require an external unwrap step
    /// before use. The engine treats these as opaque and errors if asked
    /// to use one directly as a CSEK.
    RsaEncrypted,
}

/// One entry in a key file: a resource URI, its key material, and the
/// encoding of that key material.
#[derive(Clone, Debug, Deserialize)]
pub struct EncryptionKeyEntry {
    /// Resource URI this key applies to.
    pub uri: String,
    /// Base64-encoded key bytes.
    pub key: String,
    /// Encoding of `key`.
    #[serde(rename = "key-type")]
    pub key_type: KeyType,
}

/// Parse a key file (a JSON array of [`EncryptionKeyEntry`]) and select
/// the entry whose `uri` matches `target_uri` exactly.
pub fn load_matching_key(contents: &str, target_uri: &str) -> Result<EncryptionKeyEntry, EngineError> {
    let entries: Vec<EncryptionKeyEntry> =
        serde_json::from_str(contents).map_err(|e| EngineError::EncryptionKeyFile(e.to_string()))?;
    entries
        .into_iter()
        .find(|e| e.uri == target_uri)
        .ok_or_else(|| EngineError::EncryptionKeyNotFound(target_uri.to_string()))
}

/// Decode a [`KeyType::Raw`] entry into the 32 raw CSEK bytes.
pub fn decode_raw_key(entry: &EncryptionKeyEntry) -> Result<[u8; 32], EngineError> {
    use base64::Engine as _;
    if entry.key_type != KeyType::Raw {
        return Err(EngineError::EncryptionKeyFile(format!(
            "entry for {} is not a raw key",
            entry.uri
        )));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&entry.key)
        .map_err(|e| EngineError::EncryptionKeyFile(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| EngineError::EncryptionKeyFile("CSEK key must be exactly 256 bits".into()))
}
