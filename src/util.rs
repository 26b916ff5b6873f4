//! Small utility helpers used across modules.

use serde::Serialize;
use sha2::{Digest, Sha512};
use uuid::Uuid;

/// Stable SHA-512 hex digest of a value's JSON form.
/// Returns an empty string when the value cannot be serialized.
pub fn content_hash<T: Serialize>(value: &T) -> String {
  let json = match serde_json::to_vec(value) {
    Ok(v) => v,
    Err(_) => return String::new(),
  };
  let mut hasher = Sha512::new();
  hasher.update(&json);
  hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

/// True for identifiers issued by a previous save. The nil id marks a
/// freshly-constructed record that has never been stored.
pub fn is_primary_id_valid(id: &Uuid) -> bool {
  !id.is_nil()
}

/// Parse a record identifier taken from a path or query. Nil ids are rejected.
pub fn parse_record_id(s: &str) -> Option<Uuid> {
  Uuid::parse_str(s.trim()).ok().filter(is_primary_id_valid)
}

/// Tenant codes, subjects and standards: non-empty, at most 64 chars of
/// ASCII alphanumerics plus `-`, `_`, `.` and inner spaces.
pub fn is_well_formed_code(s: &str) -> bool {
  let s = s.trim();
  !s.is_empty()
    && s.len() <= 64
    && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
}

/// Log-safe truncation for large strings.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    format!("{}… ({} chars total)", s.chars().take(max).collect::<String>(), s.chars().count())
  }
}
