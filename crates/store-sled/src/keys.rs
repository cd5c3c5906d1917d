//! Tree names and key encoding for the sled token store.
//!
//! Three trees make up the on-disk layout:
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `bk_audiences` | `{id}\0one_audience` | JSON [`Audience`](tokenauth_store::Audience) |
//! | `bk_audiences` | `{id}\0bk_one_audience_tokens\0{value}` | empty (index entry) |
//! | `bk_all_tokeninfo` | `{value}` | JSON [`Token`](tokenauth_store::Token) |
//! | `bk_token_singleIDs` | `{single_id}` | occupying token value |
//!
//! sled has no nested trees, so each audience bucket is the key range
//! sharing the `{id}\0` prefix. Audience IDs may not contain NUL.

use crate::error::SledStoreError;

/// Tree holding audience records and their token indexes.
pub(crate) const AUDIENCES_TREE: &str = "bk_audiences";

/// Tree holding every token record keyed by value.
pub(crate) const TOKENS_TREE: &str = "bk_all_tokeninfo";

/// Tree mapping single IDs to the occupying token value.
pub(crate) const SINGLE_IDS_TREE: &str = "bk_token_singleIDs";

const SEPARATOR: u8 = 0;
const INFO_KEY: &[u8] = b"one_audience";
const TOKENS_KEY: &[u8] = b"bk_one_audience_tokens";

/// Prefix shared by every key of one audience bucket.
pub(crate) fn audience_prefix(id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(id.len() + 1);
    key.extend_from_slice(id.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Key of the serialized audience record.
pub(crate) fn audience_info_key(id: &str) -> Vec<u8> {
    let mut key = audience_prefix(id);
    key.extend_from_slice(INFO_KEY);
    key
}

/// Prefix of the audience's token index entries.
pub(crate) fn audience_tokens_prefix(id: &str) -> Vec<u8> {
    let mut key = audience_prefix(id);
    key.extend_from_slice(TOKENS_KEY);
    key.push(SEPARATOR);
    key
}

/// Key of one token index entry.
pub(crate) fn audience_token_key(id: &str, value: &str) -> Vec<u8> {
    let mut key = audience_tokens_prefix(id);
    key.extend_from_slice(value.as_bytes());
    key
}

/// Recovers the token value from an index entry key.
pub(crate) fn token_value_from_index_key(
    id: &str,
    key: &[u8],
) -> std::result::Result<String, SledStoreError> {
    let prefix = audience_tokens_prefix(id);
    let suffix = key.strip_prefix(prefix.as_slice()).ok_or_else(|| {
        SledStoreError::KeyEncoding(format!("index key outside audience {id:?}"))
    })?;
    String::from_utf8(suffix.to_vec())
        .map_err(|e| SledStoreError::KeyEncoding(format!("token value is not UTF-8: {e}")))
}

/// Decodes a UTF-8 value stored in the single-slot tree.
pub(crate) fn decode_value(raw: &[u8]) -> std::result::Result<String, SledStoreError> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| SledStoreError::KeyEncoding(format!("stored value is not UTF-8: {e}")))
}
