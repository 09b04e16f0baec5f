//! Filesystem-name sanitization for target identifiers.
//!
//! Raw tool outputs are laid out under `individual-<kind>/<target>/`, and
//! target identifiers contain characters that are unsafe or unstable as
//! directory names (`/`, `:`, `@`, drive letters). The mapping must be
//! deterministic so re-running a scan reuses the same directories.

/// Convert an arbitrary target identifier into a safe single path segment.
///
/// Alphanumerics, `-`, `_` and `.` pass through; every other character maps
/// to `_`. Leading dots are replaced so the result is never hidden or `..`.
#[must_use]
pub fn sanitize_for_path(identifier: &str) -> String {
    let mut out: String = identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    while out.starts_with('.') {
        out.replace_range(0..1, "_");
    }
    if out.is_empty() {
        out.push('_');
    }
    // Cap the segment length; filesystems commonly limit names to 255 bytes.
    out.truncate(128);
    out
}

#[cfg(test)]
mod tests {
    use super::sanitize_for_path;

    #[test]
    fn maps_separators_and_registry_chars() {
        assert_eq!(
            sanitize_for_path("registry.io/library/alpine:3.20"),
            "registry.io_library_alpine_3.20"
        );
        assert_eq!(sanitize_for_path("/tmp/my repo"), "_tmp_my_repo");
        assert_eq!(
            sanitize_for_path("https://example.com/login"),
            "https___example.com_login"
        );
    }

    #[test]
    fn never_produces_dotfiles_or_empty() {
        assert_eq!(sanitize_for_path(".."), "__");
        assert_eq!(sanitize_for_path(""), "_");
        assert!(!sanitize_for_path(".hidden").starts_with('.'));
    }

    #[test]
    fn deterministic() {
        assert_eq!(
            sanitize_for_path("k8s:prod/payments"),
            sanitize_for_path("k8s:prod/payments")
        );
    }
}
