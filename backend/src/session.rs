use std::sync::Arc;
use std::time::Duration;

use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::{web, Error, HttpResponse};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::{ready, Either, Ready};
use log::debug;
use uuid::Uuid;

use crate::server::AppState;

pub const SESSION_COOKIE: &str = "churn_session";
pub const LOGIN_PAGE: &str = "/login.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub is_admin: bool,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn admits(&self, now: DateTime<Utc>) -> bool {
        self.is_admin && now < self.expires_at
    }
}

/// Server-side sessions keyed by the token held in the client's cookie.
///
/// Expiry is checked when a session is read, and an expired entry is removed
/// at that point. Issuing a session also sweeps every expired entry.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues an admin session and returns its token. Expired sessions are
    /// dropped first, so abandoned tokens do not accumulate.
    pub fn create(&self) -> String {
        self.create_at(Utc::now())
    }

    pub fn is_admitted(&self, token: &str) -> bool {
        self.is_admitted_at(token, Utc::now())
    }

    pub fn remove(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn create_at(&self, now: DateTime<Utc>) -> String {
        self.sessions.retain(|_, session| now < session.expires_at);
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.sessions.insert(
            token.clone(),
            Session {
                is_admin: true,
                expires_at,
            },
        );
        token
    }

    fn is_admitted_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let session = match self.sessions.get(token) {
            Some(entry) => *entry,
            None => return false,
        };
        if session.admits(now) {
            return true;
        }
        if now >= session.expires_at {
            debug!("Session expired at {}", session.expires_at);
            self.sessions.remove(token);
        }
        false
    }
}

pub fn session_cookie(token: &str, ttl: Duration) -> Cookie<'static> {
    let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(actix_web::cookie::time::Duration::seconds(max_age))
        .finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Admits requests that carry a live admin session; everything else is sent
/// to the login page.
pub fn require_login<S>(
    req: ServiceRequest,
    srv: &S,
) -> Either<S::Future, Ready<Result<ServiceResponse, Error>>>
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error>,
{
    let admitted = match (req.app_data::<web::Data<AppState>>(), req.cookie(SESSION_COOKIE)) {
        (Some(state), Some(cookie)) => state.sessions.is_admitted(cookie.value()),
        _ => false,
    };

    if admitted {
        Either::Left(srv.call(req))
    } else {
        debug!("Redirecting unauthenticated request for {}", req.path());
        let redirect = HttpResponse::Found()
            .insert_header((header::LOCATION, LOGIN_PAGE))
            .finish();
        Either::Right(ready(Ok(req.into_response(redirect))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_admitted_until_expiry() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let now = Utc::now();
        let token = store.create_at(now);

        assert!(store.is_admitted_at(&token, now));
        assert!(store.is_admitted_at(&token, now + chrono::Duration::minutes(59)));
        assert!(!store.is_admitted_at(&token, now + chrono::Duration::hours(1)));
        assert!(store.is_empty(), "expired session is dropped on access");
    }

    #[test]
    fn creating_a_session_drops_expired_ones() {
        let store = SessionStore::new(Duration::from_secs(60));
        let now = Utc::now();
        let abandoned = store.create_at(now);
        let fresh = store.create_at(now + chrono::Duration::minutes(2));

        assert_eq!(store.len(), 1);
        assert!(!store.sessions.contains_key(&abandoned));
        assert!(store.sessions.contains_key(&fresh));
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.create();
        assert!(!store.is_admitted("not-a-token"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sessions_without_admin_flag_are_rejected() {
        let store = SessionStore::new(Duration::from_secs(60));
        let now = Utc::now();
        store.sessions.insert(
            "guest".into(),
            Session {
                is_admin: false,
                expires_at: now + chrono::Duration::minutes(5),
            },
        );
        assert!(!store.is_admitted_at("guest", now));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::new(Duration::from_secs(60));
        let first = store.create();
        let second = store.create();
        assert_ne!(first, second);

        assert!(store.remove(&first));
        assert!(!store.is_admitted(&first));
        assert!(store.is_admitted(&second));
    }

    #[test]
    fn cookies_carry_token_and_removal_clears_it() {
        let cookie = session_cookie("abc", Duration::from_secs(3600));
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));

        let removal = removal_cookie();
        assert_eq!(removal.value(), "");
        assert_eq!(
            removal.max_age(),
            Some(actix_web::cookie::time::Duration::ZERO)
        );
    }
}
