use std::fmt;
use std::path::{Path, PathBuf};

use crate::common::{SetupError, SetupResult};

pub const SOCKET_PREFIX: &str = "exchange";
pub const SOCKET_SUFFIX: &str = ".sock";

/// Size of `sockaddr_un::sun_path`, including the trailing NUL.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const SOCKET_PATH_CAPACITY: usize = 108;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const SOCKET_PATH_CAPACITY: usize = 104;

/// Numeric identifier of a coupling channel; selects the socket file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelIdentity(u32);

impl ChannelIdentity {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Accepts the scalar a configuration file provides and rounds it to a whole number,
    /// ties to even, so `2.5` names `exchange2.sock`.
    pub fn from_scalar(value: f64) -> SetupResult<Self> {
        let rounded = value.round_ties_even();
        if !rounded.is_finite() || rounded < 0.0 || rounded > u32::MAX as f64 {
            return Err(SetupError::InvalidIdentity { value: value.to_string() });
        }
        Ok(Self(rounded as u32))
    }

    pub fn id(&self) -> u32 {
        self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}{}{}", SOCKET_PREFIX, self.0, SOCKET_SUFFIX)
    }

    /// `directory/exchange<N>.sock`
    pub fn socket_path(&self, directory: &Path) -> PathBuf {
        directory.join(self.file_name())
    }

    /// Like [`Self::socket_path`], but fails when the path cannot fit in a socket address.
    pub fn checked_socket_path(&self, directory: &Path) -> SetupResult<PathBuf> {
        let path = self.socket_path(directory);
        let len = path.as_os_str().len();
        if len >= SOCKET_PATH_CAPACITY {
            return Err(SetupError::PathTooLong {
                path,
                len,
                max: SOCKET_PATH_CAPACITY - 1,
            });
        }
        Ok(path)
    }
}

impl fmt::Display for ChannelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
