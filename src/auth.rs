use std::fmt;

use crate::error::{Result, RundeckError};

/// A Rundeck API token, sent as `X-Rundeck-Auth-Token`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// Keep tokens out of debug logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// How a session proves its identity to the server.
///
/// Exactly one mechanism is configured per session: either a long-lived API
/// token, or a username/password pair exchanged once for a `JSESSIONID`
/// cookie through the form login.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Token(Token),
    Login { username: String, password: String },
}

impl Auth {
    /// Builds the credential from the loosely-typed caller inputs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the token is combined with a
    /// username or password, when only half of a username/password pair is
    /// given, or when nothing at all is supplied.
    pub fn from_parts(
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let token = token.filter(|t| !t.is_empty());
        let username = username.filter(|u| !u.is_empty());

        match (token, username, password) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(RundeckError::Config(
                "token is mutually exclusive with user/password".to_string(),
            )),
            (Some(token), None, None) => Ok(Self::Token(Token::from(token))),
            (None, Some(username), Some(password)) => Ok(Self::Login { username, password }),
            (None, Some(_), None) | (None, None, Some(_)) => Err(RundeckError::Config(
                "user and password must be given together".to_string(),
            )),
            (None, None, None) => Err(RundeckError::Config(
                "one of token or user/password is required".to_string(),
            )),
        }
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token(_))
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(token) => f.debug_tuple("Token").field(token).finish(),
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}
