//! Same-origin check deciding which references get mirrored.

use url::Url;

/// Resolves `resource` against `page_url` and reports whether it shares the
/// page's scheme and exact hostname. Ports are not compared.
///
/// Anything that fails to resolve is treated as foreign.
pub fn is_local(resource: &str, page_url: &Url) -> bool {
    match page_url.join(resource) {
        Ok(resolved) => is_same_origin(&resolved, page_url),
        Err(_) => false,
    }
}

/// Same check as [`is_local`] for an already resolved URL.
pub fn is_same_origin(resolved: &Url, page_url: &Url) -> bool {
    if !matches!(resolved.scheme(), "http" | "https") {
        return false;
    }

    match (resolved.host_str(), page_url.host_str()) {
        (Some(resource_host), Some(page_host)) => {
            resolved.scheme() == page_url.scheme()
                && resource_host.eq_ignore_ascii_case(page_host)
        }
        _ => false,
    }
}
