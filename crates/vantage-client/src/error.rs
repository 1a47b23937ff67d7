//! Client errors

use thiserror::Error;

use crate::objects::ObjectId;

/// Errors raised by the Vantage client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VantageError {
    /// The controller requires credentials and none were given
    #[error("login required")]
    LoginRequired,

    /// The controller rejected the credentials
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// The controller could not be reached or the connection dropped
    #[error("connection error: {0}")]
    Connection(String),

    /// The controller did not answer in time
    #[error("timed out waiting for the controller")]
    Timeout,

    /// The controller answered a command with an error
    #[error("command failed: {0}")]
    Command(String),

    /// No object with this id in the controller
    #[error("object {0} not found")]
    NotFound(ObjectId),
}

impl VantageError {
    /// Credentials problems that need the user to act
    pub fn is_auth(&self) -> bool {
        matches!(self, VantageError::LoginRequired | VantageError::LoginFailed(_))
    }

    /// Transient connectivity problems worth retrying
    pub fn is_connection(&self) -> bool {
        matches!(self, VantageError::Connection(_) | VantageError::Timeout)
    }
}

pub type VantageResult<T> = Result<T, VantageError>;
