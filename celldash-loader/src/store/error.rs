use serde::Serialize;
use valuable::Valuable;

#[derive(thiserror::Error, Debug, Serialize, Valuable, Clone)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Error {
    #[error("failed to reach search store: {message}")]
    Connection { message: String },
    #[error("search store credentials missing or rejected")]
    Auth,
    #[error("search store request failed with status {status}: {message}")]
    Request { status: u16, message: String },
    #[error("unexpected response from search store: {message}")]
    Response { message: String },
}

impl Error {
    pub(crate) fn response(err: impl std::error::Error) -> Self {
        Self::Response {
            message: format!("{err:?}"),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Connection {
                message: format!("{err:?}"),
            }
        } else {
            Self::response(err)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::response(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::response(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
