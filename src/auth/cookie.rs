//! Cookie header parsing and session-cookie comparison.

use std::fmt;
use std::str::FromStr;

use http::HeaderMap;
use http::header::COOKIE;

use crate::types::{CandidateCookie, SessionToken};

/// Substring that marks a WordPress login cookie.
pub const SESSION_COOKIE_MARKER: &str = "wordpress_logged_in_";

/// How a candidate cookie is compared with a stored session token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CookieMatch {
    /// Compare the whole trimmed `name=value` pair with
    /// `"wordpress_logged_in_" + token`.
    #[default]
    Pair,
    /// Compare only the cookie value (after the first `=`) with the token.
    Value,
}

impl fmt::Display for CookieMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pair => write!(f, "pair"),
            Self::Value => write!(f, "value"),
        }
    }
}

impl FromStr for CookieMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pair" => Ok(Self::Pair),
            "value" => Ok(Self::Value),
            other => Err(format!("unknown cookie match mode '{}' (expected pair or value)", other)),
        }
    }
}

/// Collect the `cookie` header of a request.
///
/// Header names are case-insensitive. Several `cookie` lines are joined with
/// `"; "` in arrival order. Bytes that are not valid UTF-8 are replaced, so
/// an unrelated cookie with non-ASCII content never hides the login cookie.
/// Returns `None` when the header is absent or empty.
pub fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let mut joined = String::new();

    for value in headers.get_all(COOKIE) {
        let value = String::from_utf8_lossy(value.as_bytes());
        if value.trim().is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push_str("; ");
        }
        joined.push_str(&value);
    }

    (!joined.is_empty()).then_some(joined)
}

/// Cheap pre-filter: does the header mention a login cookie at all?
pub fn has_session_marker(header: &str) -> bool {
    header.contains(SESSION_COOKIE_MARKER)
}

/// Select the candidate session cookie: the last trimmed pair, in split order,
/// that contains the marker.
pub fn select_candidate(header: &str) -> Option<CandidateCookie> {
    header
        .split(';')
        .map(str::trim)
        .rfind(|pair| pair.contains(SESSION_COOKIE_MARKER))
        .map(CandidateCookie::from)
}

/// The cookie string a stored token corresponds to.
pub fn expected_cookie(token: &SessionToken) -> String {
    format!("{}{}", SESSION_COOKIE_MARKER, token.as_str())
}

impl CookieMatch {
    /// Exact, case-sensitive comparison of a candidate against a stored token.
    pub fn matches(self, candidate: &CandidateCookie, token: &SessionToken) -> bool {
        match self {
            Self::Pair => {
                constant_time_eq(candidate.as_str().as_bytes(), expected_cookie(token).as_bytes())
            }
            Self::Value => constant_time_eq(candidate.value().as_bytes(), token.as_str().as_bytes()),
        }
    }
}

/// Byte comparison whose running time does not depend on where inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(COOKIE, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_cookie_header_absent() {
        assert_eq!(cookie_header(&HeaderMap::new()), None);
        assert_eq!(cookie_header(&headers(&[""])), None);
        assert_eq!(cookie_header(&headers(&["   "])), None);
    }

    #[test]
    fn test_cookie_header_case_insensitive_name() {
        let mut map = HeaderMap::new();
        map.insert(
            http::HeaderName::from_bytes(b"Cookie").unwrap(),
            HeaderValue::from_static("a=b"),
        );
        assert_eq!(cookie_header(&map).as_deref(), Some("a=b"));
    }

    #[test]
    fn test_cookie_header_joins_multiple_lines() {
        let map = headers(&["a=b", "wordpress_logged_in_x=y"]);
        assert_eq!(
            cookie_header(&map).as_deref(),
            Some("a=b; wordpress_logged_in_x=y")
        );
    }

    #[test]
    fn test_cookie_header_keeps_non_ascii_lines() {
        let mut map = HeaderMap::new();
        map.insert(
            COOKIE,
            HeaderValue::from_bytes("city=München; wordpress_logged_in_x".as_bytes()).unwrap(),
        );
        assert_eq!(
            cookie_header(&map).as_deref(),
            Some("city=München; wordpress_logged_in_x")
        );

        let mut map = HeaderMap::new();
        map.insert(COOKIE, HeaderValue::from_bytes(b"a=\xff; b=c").unwrap());
        assert_eq!(cookie_header(&map).as_deref(), Some("a=\u{fffd}; b=c"));
    }

    #[test]
    fn test_has_session_marker() {
        assert!(has_session_marker("foo=bar; wordpress_logged_in_abc=x"));
        assert!(!has_session_marker("foo=bar; wordpress_logged_out=x"));
        assert!(!has_session_marker("WORDPRESS_LOGGED_IN_abc=x"));
    }

    #[test]
    fn test_select_candidate_trims() {
        let candidate = select_candidate("foo=bar;   wordpress_logged_in_abc=sessionXYZ  ").unwrap();
        assert_eq!(candidate.as_str(), "wordpress_logged_in_abc=sessionXYZ");
    }

    #[test]
    fn test_select_candidate_takes_last() {
        let candidate =
            select_candidate("wordpress_logged_in_a=first; x=y; wordpress_logged_in_b=second")
                .unwrap();
        assert_eq!(candidate.as_str(), "wordpress_logged_in_b=second");
    }

    #[test]
    fn test_select_candidate_none() {
        assert!(select_candidate("foo=bar; baz=qux").is_none());
        assert!(select_candidate("").is_none());
    }

    #[test]
    fn test_expected_cookie() {
        assert_eq!(
            expected_cookie(&SessionToken::new("sessionXYZ")),
            "wordpress_logged_in_sessionXYZ"
        );
    }

    #[test]
    fn test_pair_match_is_exact() {
        let token = SessionToken::new("sessionXYZ");
        assert!(CookieMatch::Pair.matches(&CandidateCookie::from("wordpress_logged_in_sessionXYZ"), &token));
        // The name suffix is part of the compared string.
        assert!(!CookieMatch::Pair.matches(
            &CandidateCookie::from("wordpress_logged_in_abc=sessionXYZ"),
            &token
        ));
        assert!(!CookieMatch::Pair.matches(&CandidateCookie::from("wordpress_logged_in_sessionxyz"), &token));
        assert!(!CookieMatch::Pair.matches(&CandidateCookie::from("wordpress_logged_in_sessionXY"), &token));
    }

    #[test]
    fn test_value_match() {
        let token = SessionToken::new("sessionXYZ");
        assert!(CookieMatch::Value.matches(
            &CandidateCookie::from("wordpress_logged_in_abc=sessionXYZ"),
            &token
        ));
        assert!(!CookieMatch::Value.matches(
            &CandidateCookie::from("wordpress_logged_in_abc=sessionXYZ2"),
            &token
        ));
    }

    #[test]
    fn test_cookie_match_parse_and_display() {
        assert_eq!("pair".parse::<CookieMatch>().unwrap(), CookieMatch::Pair);
        assert_eq!("VALUE".parse::<CookieMatch>().unwrap(), CookieMatch::Value);
        assert!("prefix".parse::<CookieMatch>().is_err());
        assert_eq!(CookieMatch::Value.to_string(), "value");
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abcd", b"abcd"));
        assert!(!constant_time_eq(b"abcd", b"abce"));
        assert!(!constant_time_eq(b"abcd", b"abc"));
    }
}
