//! The caller's identity.
//!
//! Sessions are handled in front of this server, which passes the signed-in user's id along in the
//! [`USER_ID_HEADER`] header. Handlers that act on a user's behalf take a [`CurrentUser`] argument; requests without
//! the header are turned away with `401 Unauthorized` before the handler runs.
use std::{
    fmt::Display,
    future::{ready, Ready},
};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use log::trace;

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "lpg_user_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }

    fn from_http_request(req: &HttpRequest) -> Option<Self> {
        req.headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Self(s.to_string()))
    }
}

impl Display for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromRequest for CurrentUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = Self::from_http_request(req);
        if user.is_none() {
            trace!("💻️ No {USER_ID_HEADER} header on request to {}", req.path());
        }
        ready(user.ok_or(ServerError::Unauthenticated))
    }
}
