//! URL normalization.
//!
//! A page's identity is its normalized URL: scheme, `www.`, fragment,
//! trailing slash and `utm_*` tracking parameters removed, e.g.
//! `https://www.test.com/test/#top` → `test.com/test`.
//!
//! ```rust
//! use page_harness_core::urls::normalize_url;
//!
//! let n = normalize_url("https://www.sub.lorem.com/a/?utm_source=x").unwrap();
//! assert_eq!(n.url, "sub.lorem.com/a");
//! assert_eq!(n.hostname, "sub.lorem.com");
//! assert_eq!(n.domain, "lorem.com");
//! ```

use url::{Host, Url};

use crate::error::IndexError;

/// Second-level labels under which registrations happen one level deeper
/// (`example.co.uk`, `example.com.au`).
const SHARED_SECOND_LEVEL: &[&str] = &["ac", "co", "com", "edu", "go", "gov", "ne", "net", "or", "org"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    /// Page identity.
    pub url: String,
    /// Input as given (trimmed).
    pub full_url: String,
    pub hostname: String,
    pub domain: String,
}

impl NormalizedUrl {
    /// Path and query part of the normalized URL, without host or port.
    ///
    /// `lorem.com:8080/a/b?x=1` → `/a/b?x=1`
    pub fn path(&self) -> &str {
        let rest = self.url.get(self.hostname.len()..).unwrap_or("");
        match rest.find(|c: char| c == '/' || c == '?') {
            Some(i) => &rest[i..],
            None => "",
        }
    }
}

/// Normalize a URL or scheme-less `host/path` string.
pub fn normalize_url(input: &str) -> Result<NormalizedUrl, IndexError> {
    let trimmed = input.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let parsed =
        Url::parse(&with_scheme).map_err(|_| IndexError::InvalidUrl(trimmed.to_string()))?;

    let host = match parsed.host() {
        Some(host) => host,
        None => return Err(IndexError::InvalidUrl(trimmed.to_string())),
    };

    let (hostname, domain) = match host {
        Host::Domain(name) => {
            let hostname = name.strip_prefix("www.").unwrap_or(name).to_string();
            let domain = registrable_domain(&hostname);
            (hostname, domain)
        }
        Host::Ipv4(addr) => (addr.to_string(), addr.to_string()),
        Host::Ipv6(addr) => (format!("[{}]", addr), format!("[{}]", addr)),
    };

    if hostname.is_empty() {
        return Err(IndexError::InvalidUrl(trimmed.to_string()));
    }

    let mut url = hostname.clone();
    if let Some(port) = parsed.port() {
        url.push(':');
        url.push_str(&port.to_string());
    }

    let path = parsed.path().trim_end_matches('/');
    url.push_str(path);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !kept.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        url.push('?');
        url.push_str(&query);
    }

    Ok(NormalizedUrl {
        url,
        full_url: trimmed.to_string(),
        hostname,
        domain,
    })
}

/// Best-effort registrable domain for a hostname.
pub fn registrable_domain(hostname: &str) -> String {
    let labels: Vec<&str> = hostname.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }

    let tld = labels[labels.len() - 1];
    let sld = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && SHARED_SECOND_LEVEL.contains(&sld) {
        3
    } else {
        2
    };
    labels[labels.len() - keep..].join(".")
}

/// Whether a bare query token should be treated as a domain filter.
///
/// `lorem.com` and `sub.lorem.co.uk` qualify; `e.g.`, `3.14` and anything
/// with a path do not.
pub fn looks_like_domain(token: &str) -> bool {
    if !token.contains('.') || token.contains('/') {
        return false;
    }
    let labels: Vec<&str> = token.split('.').collect();
    if labels
        .iter()
        .any(|l| l.is_empty() || !l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
    {
        return false;
    }
    labels
        .last()
        .map(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false)
}
