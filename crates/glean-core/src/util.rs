use url::Url;

use crate::error::HarvestError;

/// Parse and normalize a source URL.
///
/// Characters that are not valid in a URL path (spaces, non-ASCII) are
/// percent-encoded. Example: `"https://example.com/elf names"` →
/// `"https://example.com/elf%20names"`
pub fn normalize_url(raw: &str) -> Result<Url, HarvestError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| HarvestError::Config(format!("Invalid URL '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(HarvestError::Config(format!(
            "URL scheme '{scheme}' is not supported (only http/https): {raw}"
        ))),
    }
}

/// Origin key of a URL (`scheme://host:port`).
///
/// Returns `None` for URLs without a host.
pub fn origin_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url
        .port_or_known_default()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();
    Some(format!("{}://{}{}", url.scheme(), host, port))
}
