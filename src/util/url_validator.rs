use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a service or site base URL.
///
/// Every base URL in this crate receives credentials (API keys, WordPress
/// application passwords), so plain HTTP is only accepted for loopback hosts.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a non-loopback host.
    #[error("Insecure URL: HTTPS required (except localhost for testing)")]
    Insecure,
    /// The URL carries a query string or fragment, which cannot be a base.
    #[error("Base URL must not contain a query string or fragment")]
    NotABase,
}

/// Validates a base URL that credentials will be sent to.
///
/// # Errors
///
/// - [`UrlValidationError::InvalidUrl`] when the string does not parse
/// - [`UrlValidationError::UnsupportedScheme`] for anything but http/https
/// - [`UrlValidationError::Insecure`] for `http://` to a non-loopback host
/// - [`UrlValidationError::NotABase`] when a query or fragment is present
///
/// # Examples
///
/// ```
/// use listicle_studio::util::validate_base_url;
///
/// assert!(validate_base_url("https://decor.example.com").is_ok());
/// assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
/// assert!(validate_base_url("http://decor.example.com").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(&url) {
                return Err(UrlValidationError::Insecure);
            }
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlValidationError::NotABase);
    }

    Ok(url)
}

/// Removes a single trailing `/` so paths can be appended with `format!`.
pub fn normalize_base_url(url: &str) -> &str {
    let trimmed = url.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed)
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host_for_parse
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
