//! Repeat key codec and occurrence identity.
//!
//! A repeat *definition* (not an occurrence) is identified by a composite
//! key. Wire format, v1:
//!
//! ```text
//! {name}:{job_id}:{end_date_millis}:{tz}:{suffix}
//! ```
//!
//! Absent fields serialize as empty strings. `suffix` is the cron pattern
//! when one is set, otherwise the stringified `every` interval, otherwise
//! empty. Only the suffix may itself contain the `:` delimiter; decoding
//! splits positionally on the first four delimiters and rejoins the rest.
//!
//! Two definitions collide iff all five components match.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RepeatError, Result};
use crate::types::RepeatOptions;

const DELIMITER: char = ':';

/// Structured form of a repeat definition's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepeatKey {
    /// Job name.
    pub name: String,
    /// Caller-supplied disambiguator, if any.
    pub job_id: Option<String>,
    /// End date as epoch milliseconds, if any.
    pub end_date: Option<i64>,
    /// IANA timezone name, if any.
    pub tz: Option<String>,
    /// Pattern-or-interval suffix; empty when neither is set.
    pub suffix: String,
}

impl RepeatKey {
    /// Build the key for `name` under the given repeat options.
    pub fn from_options(name: &str, opts: &RepeatOptions) -> Self {
        let suffix = match (&opts.pattern, opts.every) {
            (Some(pattern), _) => pattern.clone(),
            (None, Some(every)) => every.to_string(),
            (None, None) => String::new(),
        };
        Self {
            name: name.to_string(),
            job_id: opts.job_id.clone(),
            end_date: opts.end_date,
            tz: opts.tz.clone(),
            suffix,
        }
    }

    /// Serialize to the canonical wire string (format v1 above).
    pub fn encode(&self) -> String {
        format!(
            "{}{d}{}{d}{}{d}{}{d}{}",
            self.name,
            self.job_id.as_deref().unwrap_or(""),
            self.end_date.map(|ms| ms.to_string()).unwrap_or_default(),
            self.tz.as_deref().unwrap_or(""),
            self.suffix,
            d = DELIMITER,
        )
    }

    /// Parse a wire string back into its components.
    ///
    /// The first four fields are positional; anything after the fourth
    /// delimiter is the suffix, colons included. An `every` interval comes
    /// back as a string suffix; the codec cannot tell it apart from a
    /// one-token cron pattern, so callers track the mode out of band.
    pub fn decode(key: &str) -> Result<Self> {
        let mut parts = key.splitn(5, DELIMITER);
        let name = parts
            .next()
            .ok_or_else(|| RepeatError::InvalidKey(key.to_string()))?;
        let (Some(job_id), Some(end_date), Some(tz), Some(suffix)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(RepeatError::InvalidKey(format!(
                "expected 5 fields: {key}"
            )));
        };
        Ok(Self {
            name: name.to_string(),
            job_id: (!job_id.is_empty()).then(|| job_id.to_string()),
            end_date: end_date.parse().ok(),
            tz: (!tz.is_empty()).then(|| tz.to_string()),
            suffix: suffix.to_string(),
        })
    }
}

impl std::fmt::Display for RepeatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Hex digest of an encoded repeat key.
///
/// The digest only exists to bound identifier length and avoid delimiter
/// collisions; it carries no security meaning.
pub fn key_digest(encoded_key: &str) -> String {
    hex::encode(Sha256::digest(encoded_key.as_bytes()))
}

/// Deterministic identifier for one occurrence of a repeat definition.
///
/// Format: `repeat:<hex(sha256(name + job_id + key_digest))>:<next_millis>`.
/// Recomputing the same occurrence always yields the same identifier, so a
/// second creation attempt collapses into an overwrite at the job store.
///
/// `next_millis = None` produces the empty-timestamp placeholder form used
/// by removal, which targets the registry entry and any pending instance
/// rather than a specific past occurrence.
pub fn occurrence_id(
    name: &str,
    next_millis: Option<i64>,
    key_digest: &str,
    job_id: Option<&str>,
) -> String {
    let checksum = hex::encode(Sha256::digest(format!(
        "{name}{}{key_digest}",
        job_id.unwrap_or("")
    )));
    match next_millis {
        Some(ms) => format!("repeat:{checksum}:{ms}"),
        None => format!("repeat:{checksum}:"),
    }
}
