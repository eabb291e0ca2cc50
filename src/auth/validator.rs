//! Session cookie validation against mirrored session records.

use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::cookie::{cookie_header, has_session_marker, select_candidate};
use crate::config::ValidatorConfig;
use crate::error::StoreError;
use crate::store::{KeyScan, RequestScope, SessionStore};
use crate::types::{CandidateCookie, StoreKey};

/// Glob pattern of the keys holding session records.
pub const SESSION_KEY_PATTERN: &str = "wp-cookie-*";

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No usable `cookie` header.
    MissingCookie,
    /// The cookie header carries no login cookie.
    NoSessionCookie,
    /// The scan finished without a matching record.
    NoMatchingSession,
    /// Scanning or fetching failed; the request fails closed.
    StoreUnavailable,
    /// The request deadline passed during the scan.
    TimedOut,
    /// The request was cancelled during the scan.
    Cancelled,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCookie => "missing cookie header",
            Self::NoSessionCookie => "no session cookie",
            Self::NoMatchingSession => "no matching session record",
            Self::StoreUnavailable => "session store unavailable",
            Self::TimedOut => "session lookup timed out",
            Self::Cancelled => "session lookup cancelled",
        }
    }
}

impl From<&StoreError> for DenyReason {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::DeadlineExceeded => Self::TimedOut,
            StoreError::Cancelled => Self::Cancelled,
            StoreError::Unavailable(_) | StoreError::Command(_) | StoreError::Protocol(_) => {
                Self::StoreUnavailable
            }
        }
    }
}

/// Outcome of one validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Authorized,
    Unauthorized(DenyReason),
}

impl Verdict {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authorized => StatusCode::OK,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Human-readable reason, for logs only.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Authorized => "matched",
            Self::Unauthorized(reason) => reason.as_str(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.status().as_u16(), self.reason())
    }
}

/// Decides whether a request's login cookie matches a session record.
///
/// Stateless across calls; the store handle is shared and may be used by any
/// number of concurrent validations.
pub struct SessionValidator {
    store: Arc<dyn SessionStore>,
    config: ValidatorConfig,
}

impl SessionValidator {
    pub fn new(store: Arc<dyn SessionStore>, config: ValidatorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate the `cookie` header of a request.
    ///
    /// `cancel` aborts the store lookup; together with the configured timeout
    /// it bounds the whole scan. Any store failure yields a denial.
    pub async fn validate(&self, headers: &HeaderMap, cancel: CancellationToken) -> Verdict {
        let Some(header) = cookie_header(headers) else {
            debug!("Denied: no cookie header");
            return Verdict::Unauthorized(DenyReason::MissingCookie);
        };

        self.validate_cookie_header(&header, cancel).await
    }

    /// Validate a raw cookie header value.
    pub async fn validate_cookie_header(&self, header: &str, cancel: CancellationToken) -> Verdict {
        if !has_session_marker(header) {
            debug!("Denied: no session cookie in header");
            return Verdict::Unauthorized(DenyReason::NoSessionCookie);
        }

        let Some(candidate) = select_candidate(header) else {
            return Verdict::Unauthorized(DenyReason::NoSessionCookie);
        };

        let scope = RequestScope::new(self.config.timeout, cancel);

        match self.find_session(&candidate, &scope).await {
            Ok(Some(key)) => {
                info!(key = %key, "Session cookie matched");
                Verdict::Authorized
            }
            Ok(None) => {
                info!("Session cookie not found in store");
                Verdict::Unauthorized(DenyReason::NoMatchingSession)
            }
            Err(e) => {
                let reason = DenyReason::from(&e);
                warn!(
                    store = self.store.name(),
                    error = %e,
                    reason = reason.as_str(),
                    "Session lookup failed, denying request"
                );
                Verdict::Unauthorized(reason)
            }
        }
    }

    /// Scan session records in store order and return the key of the first
    /// one matching `candidate`. The scan is dropped as soon as a match is
    /// found.
    async fn find_session(
        &self,
        candidate: &CandidateCookie,
        scope: &RequestScope,
    ) -> Result<Option<StoreKey>, StoreError> {
        let mut scan = KeyScan::new(
            self.store.as_ref(),
            scope,
            SESSION_KEY_PATTERN,
            self.config.scan_count,
        );
        let mut checked = 0usize;

        while let Some(key) = scan.next_key().await? {
            let Some(token) = scope.run(self.store.get(&key)).await? else {
                // Expired between scan and fetch.
                debug!(key = %key, "Session record vanished before fetch");
                continue;
            };
            checked += 1;

            if self.config.cookie_match.matches(candidate, &token) {
                debug!(checked, pages = scan.pages(), "Stopping scan on match");
                return Ok(Some(key));
            }
        }

        debug!(checked, pages = scan.pages(), "Scan exhausted");
        Ok(None)
    }
}
