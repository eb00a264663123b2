use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domains::motion::PoseField;

/// Phase of the channel lifecycle an I/O failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Create,
    Bind,
    Listen,
    Accept,
    Read,
    Write,
}

impl fmt::Display for ChannelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelPhase::Create => "create",
            ChannelPhase::Bind => "bind",
            ChannelPhase::Listen => "listen",
            ChannelPhase::Accept => "accept",
            ChannelPhase::Read => "read",
            ChannelPhase::Write => "write",
        };
        f.write_str(name)
    }
}

/// Failures while establishing the controller connection. None of these are retried.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid channel identifier: {value}")]
    InvalidIdentity { value: String },

    #[error("Socket path {path:?} is {len} bytes, platform limit is {max}")]
    PathTooLong { path: PathBuf, len: usize, max: usize },

    #[error("Socket path {path:?} is already held by an open channel")]
    PathInUse { path: PathBuf },

    #[error("Socket {phase} failed on {path:?}: {source}")]
    Io {
        phase: ChannelPhase,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the per-step exchange. Every variant is terminal for the channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Controller closed the connection on {path:?}")]
    PeerClosed { path: PathBuf },

    #[error("Controller requested termination on {path:?}")]
    TerminationRequested { path: PathBuf },

    #[error("Channel {path:?} is closed")]
    Closed { path: PathBuf },

    #[error("No controller response on {path:?} within {after:?}")]
    Timeout { path: PathBuf, after: Duration },

    #[error("Socket {phase} failed on {path:?}: {source}")]
    Io {
        phase: ChannelPhase,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Field {field} is not a number: {token:?}")]
    InvalidNumber { field: PoseField, token: String },

    #[error("Field {field} is not finite: {token:?}")]
    NonFinite { field: PoseField, token: String },
}

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("Process group must contain at least one worker")]
    EmptyGroup,

    #[error("Worker {rank} lost contact with the group")]
    Disconnected { rank: usize },

    #[error("Worker {rank} fell behind the broadcast by {skipped} messages")]
    Lagged { rank: usize, skipped: u64 },

    #[error("Broadcast encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Why the step loop stopped. Broadcast to every worker so all of them stop alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    SetupFailed(String),
    PeerClosed,
    TerminationRequested,
    Timeout,
    ChannelFailure(String),
    MalformedPayload(String),
    GroupFailure(String),
}

impl HaltReason {
    /// Normal end of a run, as opposed to a failure.
    pub fn is_orderly(&self) -> bool {
        matches!(self, HaltReason::TerminationRequested | HaltReason::PeerClosed)
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::SetupFailed(msg) => write!(f, "setup failed: {}", msg),
            HaltReason::PeerClosed => f.write_str("controller closed the connection"),
            HaltReason::TerminationRequested => f.write_str("controller requested termination"),
            HaltReason::Timeout => f.write_str("controller response timed out"),
            HaltReason::ChannelFailure(msg) => write!(f, "channel failure: {}", msg),
            HaltReason::MalformedPayload(msg) => write!(f, "malformed payload: {}", msg),
            HaltReason::GroupFailure(msg) => write!(f, "process group failure: {}", msg),
        }
    }
}

impl From<&ChannelError> for HaltReason {
    fn from(err: &ChannelError) -> Self {
        match err {
            ChannelError::PeerClosed { .. } => HaltReason::PeerClosed,
            ChannelError::TerminationRequested { .. } => HaltReason::TerminationRequested,
            ChannelError::Timeout { .. } => HaltReason::Timeout,
            ChannelError::Closed { .. } | ChannelError::Io { .. } => {
                HaltReason::ChannelFailure(err.to_string())
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Halted at step {step}: {reason}")]
    Halted { step: u64, reason: HaltReason },

    #[error("Decode error at step {step}: {source}")]
    Decode {
        step: u64,
        #[source]
        source: DecodeError,
    },

    #[error("Process group error: {0}")]
    Group(#[from] GroupError),
}

impl SyncError {
    pub fn halt_reason(&self) -> Option<&HaltReason> {
        match self {
            SyncError::Halted { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Synchronization error: {0}")]
    Sync(#[from] SyncError),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

pub type SetupResult<T> = Result<T, SetupError>;
pub type ChannelResult<T> = Result<T, ChannelError>;
pub type DecodeResult<T> = Result<T, DecodeError>;
pub type GroupResult<T> = Result<T, GroupError>;
pub type SyncResult<T> = Result<T, SyncError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
