//! `htu` normalization shared by builder and verifier.

/// Normalize an absolute URI for use as (or comparison with) `htu`.
///
/// - scheme and host lowercased, default ports dropped (done by `url`)
/// - query and fragment removed
///
/// Returns `None` for relative or host-less URIs.
pub fn normalize_htu(uri: &str) -> Option<String> {
    let mut url = url::Url::parse(uri).ok()?;
    if !url.has_host() {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}
