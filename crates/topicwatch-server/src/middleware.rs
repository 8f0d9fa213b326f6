//! Request id, API-key auth, and per-caller rate limiting.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{ApiError, ErrorCode};

const API_KEYS_VAR: &str = "TOPICWATCH_API_KEYS";
const REQUEST_ID_HEADER: &str = "x-request-id";
const USERS_PREFIX: &str = "/api/v1/users/";

/// Once this many callers are tracked, expired buckets are dropped.
const PRUNE_THRESHOLD: usize = 4096;

/// Request id carried in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// API-key gate for the protected routes.
#[derive(Debug, Clone)]
pub enum AuthState {
    /// No keys configured; only allowed in development.
    Open,
    Keys(Arc<HashSet<String>>),
}

impl AuthState {
    /// Reads comma-separated bearer tokens from `TOPICWATCH_API_KEYS`.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// An empty key list opens the API in development and is a startup
    /// error anywhere else.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        match (keys.is_empty(), is_development) {
            (false, _) => Ok(AuthState::Keys(Arc::new(keys))),
            (true, true) => {
                tracing::warn!("auth: {API_KEYS_VAR} not set, API is open in development");
                Ok(AuthState::Open)
            }
            (true, false) => {
                anyhow::bail!("{API_KEYS_VAR} must list at least one key outside development")
            }
        }
    }

    #[must_use]
    pub fn is_enforced(&self) -> bool {
        matches!(self, AuthState::Keys(_))
    }

    fn accepts(&self, token: Option<&str>) -> bool {
        match self {
            AuthState::Open => true,
            AuthState::Keys(keys) => token.is_some_and(|t| keys.contains(t)),
        }
    }
}

/// Who a request is counted against: the bearer token when one is sent,
/// else the user id in a `/users/{id}/...` path, else a shared bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallerKey {
    Token(String),
    User(i64),
    Anonymous,
}

impl CallerKey {
    fn from_request(req: &Request) -> Self {
        if let Some(token) = bearer_token(req.headers().get(AUTHORIZATION)) {
            return CallerKey::Token(token.to_owned());
        }
        user_id_from_path(req.uri().path()).map_or(CallerKey::Anonymous, CallerKey::User)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    opened_at: Instant,
    used: usize,
}

/// Fixed-window request budget, one window per [`CallerKey`].
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    buckets: Arc<Mutex<HashMap<CallerKey, Bucket>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spends one request from `caller`'s budget. On refusal returns how
    /// long until the caller's window resets.
    pub async fn try_acquire(&self, caller: CallerKey, now: Instant) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= PRUNE_THRESHOLD {
            buckets.retain(|_, b| now.duration_since(b.opened_at) < self.window);
        }

        let bucket = buckets.entry(caller).or_insert(Bucket {
            opened_at: now,
            used: 0,
        });
        let age = now.duration_since(bucket.opened_at);
        if age >= self.window {
            *bucket = Bucket {
                opened_at: now,
                used: 0,
            };
        }

        if bucket.used >= self.max_requests {
            return Err(self.window.saturating_sub(now.duration_since(bucket.opened_at)));
        }
        bucket.used += 1;
        Ok(())
    }
}

/// Reuses an incoming `x-request-id` or mints a `UUIDv4`, stores it as
/// [`RequestId`], and echoes it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if auth.accepts(bearer_token(req.headers().get(AUTHORIZATION))) {
        return next.run(req).await;
    }
    tracing::debug!(path = %req.uri().path(), "auth: rejected request");
    ApiError::new(
        request_id_of(&req),
        ErrorCode::Unauthorized,
        "missing or invalid bearer token",
    )
    .into_response()
}

pub async fn enforce_rate_limit(
    State(limits): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let caller = CallerKey::from_request(&req);
    match limits.try_acquire(caller, Instant::now()).await {
        Ok(()) => next.run(req).await,
        Err(retry_in) => {
            let mut res = ApiError::new(
                request_id_of(&req),
                ErrorCode::RateLimited,
                "rate limit exceeded",
            )
            .into_response();
            // Whole seconds, rounded up so clients never retry early.
            let secs = retry_in.as_secs() + u64::from(retry_in.subsec_nanos() > 0);
            res.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
            res
        }
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn user_id_from_path(path: &str) -> Option<i64> {
    path.strip_prefix(USERS_PREFIX)?
        .split('/')
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_trimmed_and_scheme_checked() {
        let header = HeaderValue::from_static("Bearer  test-token ");
        assert_eq!(bearer_token(Some(&header)), Some("test-token"));

        let basic = HeaderValue::from_static("Basic abc123");
        assert_eq!(bearer_token(Some(&basic)), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn open_auth_only_in_development() {
        let open = AuthState::from_keys("", true).expect("dev allows missing keys");
        assert!(!open.is_enforced());
        assert!(open.accepts(None));

        assert!(AuthState::from_keys(" , ", false).is_err());
    }

    #[test]
    fn configured_keys_are_split_and_trimmed() {
        let auth = AuthState::from_keys("alpha, beta ,", false).expect("keys");
        assert!(auth.is_enforced());
        assert!(auth.accepts(Some("alpha")));
        assert!(auth.accepts(Some("beta")));
        assert!(!auth.accepts(Some("")));
        assert!(!auth.accepts(None));
    }

    #[test]
    fn user_id_is_read_from_user_scoped_paths() {
        assert_eq!(user_id_from_path("/api/v1/users/42/subscriptions"), Some(42));
        assert_eq!(user_id_from_path("/api/v1/users/7"), Some(7));
        assert_eq!(user_id_from_path("/api/v1/users/me/subscriptions"), None);
        assert_eq!(user_id_from_path("/api/v1/topics/3/posts"), None);
    }

    #[tokio::test]
    async fn each_caller_gets_its_own_window() {
        let limits = RateLimitState::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limits.try_acquire(CallerKey::User(1), now).await.is_ok());
        assert!(limits.try_acquire(CallerKey::User(1), now).await.is_ok());
        let retry = limits
            .try_acquire(CallerKey::User(1), now + Duration::from_secs(15))
            .await
            .expect_err("third request in the window");
        assert_eq!(retry, Duration::from_secs(45));

        assert!(limits.try_acquire(CallerKey::User(2), now).await.is_ok());
        assert!(limits
            .try_acquire(CallerKey::Token("k".to_string()), now)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn window_resets_after_it_elapses() {
        let limits = RateLimitState::new(1, Duration::from_secs(10));
        let now = Instant::now();

        assert!(limits.try_acquire(CallerKey::Anonymous, now).await.is_ok());
        assert!(limits.try_acquire(CallerKey::Anonymous, now).await.is_err());
        assert!(limits
            .try_acquire(CallerKey::Anonymous, now + Duration::from_secs(10))
            .await
            .is_ok());
    }
}
