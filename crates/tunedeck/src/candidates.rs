//! Candidate URL generation
//!
//! Internet radio servers differ widely in redirect and suffix conventions;
//! trying a bounded, ordered candidate set per entry converges on a playable
//! endpoint without user intervention.

use crate::config::network::STREAM_PROXY;
use url::{Host, Url};

/// Wrap a target URL in the relay endpoint
pub fn proxy_url(target: &str) -> String {
    format!("{STREAM_PROXY}?url={}", urlencoding::encode(target))
}

/// Normalize the trailing slash and append the `;` suffix some streaming
/// servers require to serve the raw stream instead of an HTML status page.
fn semicolon_variant(url: &str) -> String {
    let mut variant = url.to_string();
    if !variant.ends_with('/') {
        variant.push('/');
    }
    variant.push(';');
    variant
}

/// Whether the URL's host is a raw IP literal (IPv4 dotted-quad or IPv6).
/// The relay cannot reach bare IPs, so these are never proxied.
pub fn is_raw_ip_host(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_))),
        Err(_) => false,
    }
}

/// Produce the ordered list of URLs to probe for one playlist entry.
///
/// Direct variants come first: the raw URL, then the `;`-suffixed form
/// (skipped when the URL already ends in `;`). When the page is a secure
/// origin and the entry is plain `http://`, each direct variant is retried
/// through the relay after all direct attempts, except for raw IP hosts.
pub fn candidates(entry_url: &str, page_is_secure: bool) -> Vec<String> {
    let mut direct = vec![entry_url.to_string()];
    if !entry_url.ends_with(';') {
        direct.push(semicolon_variant(entry_url));
    }

    let mut ordered = direct.clone();
    if page_is_secure && entry_url.starts_with("http://") && !is_raw_ip_host(entry_url) {
        ordered.extend(direct.iter().map(|variant| proxy_url(variant)));
    }
    ordered
}
