//! Version ordering, retention and storage-key derivation.
//!
//! Everything here is pure: no I/O, no clocks. Callers hand in records
//! fetched from the metadata store and act on the decisions returned.

use crate::db::ArtifactRecord;
use crate::version::error::VersionError;
use std::cmp::Ordering;
use std::fmt;

/// A validated version token such as `1.2.0`, `v2.0.1` or `nightly-0412`.
///
/// Tokens made of exactly three dot-separated non-negative integers, with an
/// optional leading `v`, are semantic and order numerically. Every other
/// token is opaque and orders by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken {
    raw: String,
    semantic: Option<[u64; 3]>,
}

impl VersionToken {
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        if raw.is_empty() {
            return Err(VersionError::InvalidVersionToken(
                raw.to_string(),
                "must not be empty",
            ));
        }
        if raw.contains('/') {
            return Err(VersionError::InvalidVersionToken(
                raw.to_string(),
                "must not contain '/'",
            ));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(VersionError::InvalidVersionToken(
                raw.to_string(),
                "must not contain whitespace or control characters",
            ));
        }

        Ok(Self {
            raw: raw.to_string(),
            semantic: parse_semantic(raw),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Numeric components when the token is semantic
    pub fn semantic(&self) -> Option<[u64; 3]> {
        self.semantic
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_semantic(raw: &str) -> Option<[u64; 3]> {
    let body = raw.strip_prefix('v').unwrap_or(raw);
    let mut parts = body.split('.');
    let mut components = [0u64; 3];

    for component in components.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *component = part.parse().ok()?;
    }

    match parts.next() {
        Some(_) => None,
        None => Some(components),
    }
}

/// Model names become the first key segment, so they must not contain `/`.
pub fn validate_model_name(model_name: &str) -> Result<(), VersionError> {
    if model_name.trim().is_empty() {
        return Err(VersionError::InvalidModelName(
            model_name.to_string(),
            "must not be empty",
        ));
    }
    if model_name.contains('/') {
        return Err(VersionError::InvalidModelName(
            model_name.to_string(),
            "must not contain '/'",
        ));
    }
    if model_name.chars().any(char::is_control) {
        return Err(VersionError::InvalidModelName(
            model_name.to_string(),
            "must not contain control characters",
        ));
    }
    Ok(())
}

/// Object-store key for a model name and optional version.
///
/// `resnet` + none -> `resnet.pth`, `resnet` + `1.0.0` -> `resnet/1.0.0.pth`.
/// Unversioned keys never contain `/` and versioned keys contain exactly one,
/// so distinct pairs never share a key for a fixed extension.
pub fn derive_storage_key(
    model_name: &str,
    version: Option<&VersionToken>,
    extension: &str,
) -> Result<String, VersionError> {
    validate_model_name(model_name)?;
    Ok(match version {
        Some(token) => format!("{}/{}{}", model_name, token, extension),
        None => format!("{}{}", model_name, extension),
    })
}

/// Strip the artifact extension from an uploaded filename
pub fn model_name_from_filename(filename: &str, extension: &str) -> String {
    if extension.is_empty() {
        return filename.to_string();
    }
    filename
        .strip_suffix(extension)
        .unwrap_or(filename)
        .to_string()
}

fn semantic_of(record: &ArtifactRecord) -> Option<[u64; 3]> {
    record.version.as_deref().and_then(parse_semantic)
}

fn creation_order(a: &ArtifactRecord, b: &ArtifactRecord) -> Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}

/// Ascending order of two versions of the same artifact (`Less` = older).
///
/// Semantic tokens compare numerically; otherwise creation time decides.
/// Equal tokens fall through to creation time, then id.
pub fn compare_versions(a: &ArtifactRecord, b: &ArtifactRecord) -> Ordering {
    match (semantic_of(a), semantic_of(b)) {
        (Some(left), Some(right)) => left.cmp(&right).then_with(|| creation_order(a, b)),
        _ => creation_order(a, b),
    }
}

/// Sort versions newest first.
///
/// Semantic ordering is used only when every record is semantic; a set with
/// any opaque or missing token is ordered purely by creation time. Mixing the
/// two per pair would not be transitive.
pub fn sort_newest_first(mut records: Vec<ArtifactRecord>) -> Vec<ArtifactRecord> {
    if records.iter().all(|record| semantic_of(record).is_some()) {
        records.sort_by(|a, b| compare_versions(b, a));
    } else {
        records.sort_by(|a, b| creation_order(b, a));
    }
    records
}

/// Records beyond the `keep_count` newest, newest first
pub fn select_versions_to_evict(
    records: Vec<ArtifactRecord>,
    keep_count: i64,
) -> Result<Vec<ArtifactRecord>, VersionError> {
    if keep_count <= 0 {
        return Err(VersionError::InvalidKeepCount(keep_count));
    }

    let mut sorted = sort_newest_first(records);
    let split = usize::try_from(keep_count)
        .unwrap_or(usize::MAX)
        .min(sorted.len());
    Ok(sorted.split_off(split))
}
