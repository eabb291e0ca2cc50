//! Session cookie authentication.
//!
//! Answers one question for an upstream proxy: does the request carry a
//! WordPress login cookie that matches a session record mirrored into the
//! session store by the login system?
//!
//! ## Flow
//!
//! 1. Requests without a `wordpress_logged_in_` cookie are denied without
//!    touching the store.
//! 2. The last login cookie in the header is selected as the candidate.
//! 3. Keys matching `wp-cookie-*` are scanned lazily; each value is fetched
//!    and compared with the candidate. The first match authorizes.
//! 4. Any store failure, timeout or cancellation denies (fail-closed).
//!
//! ## Usage
//!
//! ```ignore
//! let validator = SessionValidator::new(store, ValidatorConfig::default());
//! let verdict = validator.validate(&headers, CancellationToken::new()).await;
//! assert_eq!(verdict.status(), StatusCode::OK);
//! ```

mod cookie;
mod validator;

pub use cookie::{
    CookieMatch, SESSION_COOKIE_MARKER, cookie_header, expected_cookie, has_session_marker,
    select_candidate,
};
pub use validator::{DenyReason, SESSION_KEY_PATTERN, SessionValidator, Verdict};
