//! Proof-of-payment attachment references.
//!
//! Stored filenames come in a few historical shapes: a bare name, `uploads/<name>`,
//! `/uploads/<name>`, `backend/uploads/<name>` and `/backend/uploads/<name>`. All of
//! them collapse to the bare name served under `{api_base}/uploads/`. Anything else is
//! treated as already canonical.

const UPLOADS_SEGMENT: &str = "uploads/";
const BACKEND_SEGMENT: &str = "backend/";

/// Maps a stored filename to the URL the attachment can be fetched from.
///
/// Returns `None` when there is nothing to fetch, so callers show "No attachment"
/// instead of issuing a request.
pub fn resolve_attachment_url(raw_filename: Option<&str>, api_base: &str) -> Option<String> {
    let raw = raw_filename.map(str::trim).filter(|value| !value.is_empty())?;
    let filename = strip_legacy_prefix(raw);
    if filename.is_empty() {
        return None;
    }

    let base = api_base.trim_end_matches('/');
    Some(format!("{base}/{UPLOADS_SEGMENT}{filename}"))
}

/// Strips the anchored, case-sensitive `/?(backend/)?uploads/` prefix.
pub fn strip_legacy_prefix(raw: &str) -> &str {
    let rest = raw.strip_prefix('/').unwrap_or(raw);
    let rest = rest.strip_prefix(BACKEND_SEGMENT).unwrap_or(rest);
    rest.strip_prefix(UPLOADS_SEGMENT).unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::{resolve_attachment_url, strip_legacy_prefix};

    #[test]
    fn missing_or_blank_filename_has_no_attachment() {
        assert_eq!(resolve_attachment_url(None, "http://h"), None);
        assert_eq!(resolve_attachment_url(Some(""), "http://h"), None);
        assert_eq!(resolve_attachment_url(Some("   "), "http://h"), None);
    }

    #[test]
    fn every_legacy_form_collapses_to_the_bare_name() {
        for raw in [
            "x.png",
            "uploads/x.png",
            "/uploads/x.png",
            "backend/uploads/x.png",
            "/backend/uploads/x.png",
        ] {
            assert_eq!(
                resolve_attachment_url(Some(raw), "http://h/").as_deref(),
                Some("http://h/uploads/x.png"),
                "raw filename `{raw}`"
            );
        }
    }

    #[test]
    fn proof_link_for_backend_prefixed_filename() {
        assert_eq!(
            resolve_attachment_url(Some("backend/uploads/proof1.jpg"), "https://api.x").as_deref(),
            Some("https://api.x/uploads/proof1.jpg")
        );
    }

    #[test]
    fn unmatched_prefixes_pass_through_unchanged() {
        assert_eq!(strip_legacy_prefix("backend/x.png"), "backend/x.png");
        assert_eq!(strip_legacy_prefix("Uploads/x.png"), "Uploads/x.png");
        assert_eq!(strip_legacy_prefix("//uploads/x.png"), "//uploads/x.png");
        assert_eq!(strip_legacy_prefix("receipts/uploads/x.png"), "receipts/uploads/x.png");
        assert_eq!(
            resolve_attachment_url(Some("backend/x.png"), "http://h").as_deref(),
            Some("http://h/uploads/backend/x.png")
        );
    }

    #[test]
    fn only_the_leading_prefix_is_stripped() {
        assert_eq!(strip_legacy_prefix("uploads/uploads/x.png"), "uploads/x.png");
        assert_eq!(strip_legacy_prefix("/backend/uploads/a/b.pdf"), "a/b.pdf");
    }

    #[test]
    fn trailing_slashes_on_base_are_dropped() {
        assert_eq!(
            resolve_attachment_url(Some("x.png"), "http://h//").as_deref(),
            Some("http://h/uploads/x.png")
        );
    }

    #[test]
    fn prefix_only_filename_is_not_an_attachment() {
        assert_eq!(resolve_attachment_url(Some("/backend/uploads/"), "http://h"), None);
    }
}
