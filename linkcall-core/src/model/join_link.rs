use crate::model::session::SessionId;
use crate::utils::JOIN_TOKEN_PARAM;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;
use url::form_urlencoded::byte_serialize;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinLinkError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("url has no `token` query parameter")]
    MissingToken,
}

/// Shareable link that lets a second participant join a session:
/// `<origin>?token=<sessionId>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLink {
    origin: String,
    session_id: SessionId,
}

impl JoinLink {
    pub fn new(origin: &str, session_id: SessionId) -> Result<Self, JoinLinkError> {
        let parsed = Url::parse(origin)?;
        Ok(Self {
            origin: parsed.origin().ascii_serialization(),
            session_id,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl fmt::Display for JoinLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token: String = byte_serialize(self.session_id.as_str().as_bytes()).collect();
        write!(f, "{}?{}={}", self.origin, JOIN_TOKEN_PARAM, token)
    }
}

impl FromStr for JoinLink {
    type Err = JoinLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s)?;
        let token = token_from_url(&url).ok_or(JoinLinkError::MissingToken)?;
        Ok(Self {
            origin: url.origin().ascii_serialization(),
            session_id: token,
        })
    }
}

/// What a process should do on start, decided by the url it was opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupRole {
    /// A join token was supplied: answer that session right away.
    Callee(SessionId),
    /// No token: stay idle until the user starts a call.
    AwaitCaller,
}

impl StartupRole {
    pub fn from_url(url: &str) -> Result<Self, JoinLinkError> {
        let url = Url::parse(url)?;
        Ok(match token_from_url(&url) {
            Some(id) => StartupRole::Callee(id),
            None => StartupRole::AwaitCaller,
        })
    }
}

fn token_from_url(url: &Url) -> Option<SessionId> {
    url.query_pairs()
        .find(|(key, value)| key == JOIN_TOKEN_PARAM && !value.is_empty())
        .map(|(_, value)| SessionId::from(value.into_owned()))
}
