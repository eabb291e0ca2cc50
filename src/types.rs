//! NewType wrappers for the strings that flow through a validation.
//!
//! Store keys are plain identifiers and print normally. Session tokens and
//! candidate cookies are credentials: their `Debug` and `Display` output is
//! redacted so they cannot end up in logs or error messages by accident.

use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
///
/// The `redacted` form replaces `Debug`/`Display` output with a fixed marker.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        newtype_string!(@common $name);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
    (
        redacted
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        newtype_string!(@common $name);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(<redacted {} bytes>)", stringify!($name), self.0.len())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "<redacted>")
            }
        }
    };
    (@common $name:ident) => {
        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Key of a session record in the store (e.g., "wp-cookie-42").
    StoreKey
);

newtype_string!(
    redacted
    /// Opaque session token mirrored into the store by the login system.
    SessionToken
);

newtype_string!(
    redacted
    /// The single trimmed `name=value` pair selected from a cookie header.
    CandidateCookie
);

impl CandidateCookie {
    /// The part after the first `=`, or the whole pair when there is no `=`.
    pub fn value(&self) -> &str {
        self.0
            .split_once('=')
            .map(|(_, value)| value)
            .unwrap_or(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_display() {
        let key = StoreKey::new("wp-cookie-1");
        assert_eq!(key.to_string(), "wp-cookie-1");
        assert_eq!(key.as_str(), "wp-cookie-1");
        assert_eq!(format!("{:?}", key), "StoreKey(\"wp-cookie-1\")");
    }

    #[test]
    fn test_session_token_is_redacted() {
        let token = SessionToken::new("sessionXYZ");
        assert_eq!(token.to_string(), "<redacted>");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("sessionXYZ"));
        assert_eq!(debug, "SessionToken(<redacted 10 bytes>)");
        assert_eq!(token.as_str(), "sessionXYZ");
    }

    #[test]
    fn test_candidate_cookie_is_redacted() {
        let candidate = CandidateCookie::new("wordpress_logged_in_abc=secret");
        assert!(!format!("{:?}", candidate).contains("secret"));
        assert!(!candidate.to_string().contains("secret"));
    }

    #[test]
    fn test_candidate_cookie_value() {
        assert_eq!(
            CandidateCookie::from("wordpress_logged_in_abc=admin|1700|tok").value(),
            "admin|1700|tok"
        );
        assert_eq!(CandidateCookie::from("a=b=c").value(), "b=c");
        assert_eq!(
            CandidateCookie::from("wordpress_logged_in_").value(),
            "wordpress_logged_in_"
        );
    }
}
