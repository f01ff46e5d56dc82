//! Return-URL guard (open-redirect defense).
//!
//! A return URL is acceptable only if it is local and points at the authorize
//! endpoint or its callback. With `allow_origin_in_return_url`, an absolute URL
//! on this server's own origin is reduced to its local part first.

pub const AUTHORIZE_PATH: &str = "connect/authorize";
pub const AUTHORIZE_CALLBACK_PATH: &str = "connect/authorize/callback";

#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnUrlGuard {
    allow_origin_in_return_url: bool,
}

impl ReturnUrlGuard {
    pub fn new(allow_origin_in_return_url: bool) -> Self {
        Self {
            allow_origin_in_return_url,
        }
    }

    /// - `origin`: this server's origin, e.g. `https://idp.example.com`.
    pub fn is_valid_return_url(&self, return_url: &str, origin: &str) -> bool {
        let mut candidate = return_url;

        if self.allow_origin_in_return_url {
            if !parses_as_uri(candidate) {
                tracing::trace!("returnUrl is not valid");
                return false;
            }
            if let Some(prefix) = candidate.get(..origin.len())
                && !origin.is_empty()
                && prefix.eq_ignore_ascii_case(origin)
            {
                candidate = &candidate[origin.len()..];
            }
        }

        if is_local_url(candidate) {
            let path = candidate.split('?').next().unwrap_or_default();
            let path = path.split('#').next().unwrap_or_default();

            if path.ends_with(AUTHORIZE_PATH) || path.ends_with(AUTHORIZE_CALLBACK_PATH) {
                tracing::trace!("returnUrl is valid");
                return true;
            }
        }

        tracing::trace!("returnUrl is not valid");
        false
    }
}

/// `/` or `/path`, but never `//host` or `/\host`, and no control characters.
pub fn is_local_url(url: &str) -> bool {
    let bytes = url.as_bytes();
    match bytes {
        [b'/'] => true,
        [b'/', second, ..] if *second != b'/' && *second != b'\\' => {
            !url[1..].chars().any(char::is_control)
        }
        _ => false,
    }
}

fn parses_as_uri(s: &str) -> bool {
    if url::Url::parse(s).is_ok() {
        return true;
    }
    // Relative reference: resolve against a throwaway base.
    url::Url::parse("http://localhost/")
        .and_then(|base| base.join(s))
        .is_ok()
}
