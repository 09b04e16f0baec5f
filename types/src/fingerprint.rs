//! Stable finding identity.
//!
//! The fingerprint is the central invariant of the whole pipeline: two
//! findings with the same fingerprint are the same defect, across runs and
//! across tool versions (as long as the tool keeps its rule ids stable).
//!
//! `fingerprint = sha256(tool_name | rule_id | normalized_path | start_line |
//! message_prefix)` reduced to 32 hex characters. The message prefix is the
//! first [`FINGERPRINT_MESSAGE_PREFIX`] characters with runs of whitespace
//! collapsed to a single space, so cosmetic reflowing of a tool's message
//! does not change identity.

use sha2::{Digest, Sha256};

/// Number of message characters that participate in the fingerprint.
pub const FINGERPRINT_MESSAGE_PREFIX: usize = 120;

/// Number of hex characters kept from the 256-bit digest.
const FINGERPRINT_HEX_LEN: usize = 32;

/// A computed fingerprint token (lowercase hex).
pub type Fingerprint = String;

/// Normalize a location path for fingerprinting: forward slashes, no leading
/// `./`, trailing slashes stripped. Non-file targets pass their identifier
/// through unchanged apart from slash normalization.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let trimmed = forward
        .strip_prefix("./")
        .unwrap_or(&forward)
        .trim_end_matches('/');
    trimmed.to_string()
}

/// Collapse whitespace runs and truncate to the fingerprint prefix length.
fn message_prefix(message: &str) -> String {
    let mut out = String::with_capacity(FINGERPRINT_MESSAGE_PREFIX);
    let mut last_was_space = false;
    for ch in message.trim().chars() {
        let ch = if ch.is_whitespace() { ' ' } else { ch };
        if ch == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(ch);
        if out.chars().count() >= FINGERPRINT_MESSAGE_PREFIX {
            break;
        }
    }
    out
}

/// Compute the fingerprint for a cross-tool consensus class.
///
/// Certain defect classes (well-known secret detectors, for now) are
/// reported by several tools with tool-specific rule ids and messages. A
/// consensus key collapses them onto one identity so the deduplicator can
/// merge them: the key replaces both the tool and rule components, and the
/// message is excluded because each tool words it differently.
#[must_use]
pub fn fingerprint_consensus(
    consensus_key: &str,
    path: &str,
    start_line: Option<u32>,
) -> Fingerprint {
    fingerprint("consensus", consensus_key, path, start_line, "")
}

/// Compute the stable fingerprint for a finding.
#[must_use]
pub fn fingerprint(
    tool_name: &str,
    rule_id: &str,
    path: &str,
    start_line: Option<u32>,
    message: &str,
) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update(b"|");
    hasher.update(rule_id.as_bytes());
    hasher.update(b"|");
    hasher.update(normalize_path(path).as_bytes());
    hasher.update(b"|");
    match start_line {
        Some(line) => hasher.update(line.to_string().as_bytes()),
        None => hasher.update(b"-"),
    }
    hasher.update(b"|");
    hasher.update(message_prefix(message).as_bytes());

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(FINGERPRINT_HEX_LEN);
    for byte in digest.iter().take(FINGERPRINT_HEX_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::{FINGERPRINT_MESSAGE_PREFIX, fingerprint, normalize_path};

    #[test]
    fn stable_across_calls() {
        let a = fingerprint("gitleaks", "aws-access-key", "src/secret.py", Some(3), "AWS key");
        let b = fingerprint("gitleaks", "aws-access-key", "src/secret.py", Some(3), "AWS key");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_inputs_distinct_ids() {
        let a = fingerprint("gitleaks", "aws-access-key", "a.py", Some(1), "m");
        let b = fingerprint("gitleaks", "aws-access-key", "a.py", Some(2), "m");
        let c = fingerprint("trufflehog", "aws-access-key", "a.py", Some(1), "m");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn path_normalization_unifies_separators() {
        let a = fingerprint("t", "r", "src\\lib.rs", Some(1), "m");
        let b = fingerprint("t", "r", "./src/lib.rs", Some(1), "m");
        assert_eq!(a, b);
        assert_eq!(normalize_path(".\\src\\lib.rs"), "src/lib.rs");
    }

    #[test]
    fn whitespace_collapse_in_message() {
        let a = fingerprint("t", "r", "p", None, "hard   coded\tsecret");
        let b = fingerprint("t", "r", "p", None, "hard coded secret");
        assert_eq!(a, b);
    }

    #[test]
    fn message_truncation_bounds_identity() {
        let long_a = format!("{}{}", "x".repeat(FINGERPRINT_MESSAGE_PREFIX), "tail one");
        let long_b = format!("{}{}", "x".repeat(FINGERPRINT_MESSAGE_PREFIX), "tail two");
        let a = fingerprint("t", "r", "p", None, &long_a);
        let b = fingerprint("t", "r", "p", None, &long_b);
        assert_eq!(a, b, "differences past the prefix must not change identity");
    }

    #[test]
    fn missing_line_is_explicit() {
        let none = fingerprint("t", "r", "p", None, "m");
        let zero = fingerprint("t", "r", "p", Some(0), "m");
        assert_ne!(none, zero);
    }
}
