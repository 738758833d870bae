use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use services::SESSION_COOKIE;

/// Session token from the `Cookie` header(s), if present and non-empty.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age_secs: u32,
}

impl CookiePolicy {
    /// `Set-Cookie` value carrying a fresh session token.
    #[must_use]
    pub fn issue(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.max_age_secs,
            self.secure_suffix()
        )
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie.
    #[must_use]
    pub fn clear(&self) -> String {
        format!(
            "{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            self.secure_suffix()
        )
    }

    fn secure_suffix(&self) -> &'static str {
        if self.secure { "; Secure" } else { "" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(values: &[&'static str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for value in values {
            map.append(COOKIE, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn finds_token_among_other_cookies() {
        let map = headers(&["theme=dark; auth_session=abc-123; lang=ko"]);
        assert_eq!(session_token(&map).as_deref(), Some("abc-123"));
    }

    #[test]
    fn reads_across_multiple_headers() {
        let map = headers(&["theme=dark", "auth_session=xyz"]);
        assert_eq!(session_token(&map).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_or_empty_cookie_is_none() {
        assert_eq!(session_token(&headers(&["theme=dark"])), None);
        assert_eq!(session_token(&headers(&["auth_session="])), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_attributes() {
        let policy = CookiePolicy {
            secure: false,
            max_age_secs: 1800,
        };
        assert_eq!(
            policy.issue("t0k"),
            "auth_session=t0k; Path=/; HttpOnly; SameSite=Lax; Max-Age=1800"
        );
        let secure = CookiePolicy {
            secure: true,
            ..policy
        };
        assert!(secure.clear().ends_with("Max-Age=0; Secure"));
    }
}
