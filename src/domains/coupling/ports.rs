use async_trait::async_trait;

use super::payload::RawPayload;
use crate::common::{ChannelResult, GroupResult};

pub const LEADER_RANK: usize = 0;

/// Port to the external controller. Only the leader ever holds one.
#[async_trait]
pub trait ControllerLink: Send {
    /// One blocking request/response round with the controller.
    async fn exchange(&mut self) -> ChannelResult<RawPayload>;

    /// Human readable endpoint, used in diagnostics.
    fn endpoint(&self) -> String;
}

/// Port to the host's group of cooperating workers.
#[async_trait]
pub trait ProcessGroup: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_leader(&self) -> bool {
        self.rank() == LEADER_RANK
    }

    /// Collective: every worker must call it. The leader's `bytes` are
    /// returned on every worker; followers' arguments are ignored.
    async fn broadcast(&self, bytes: Vec<u8>) -> GroupResult<Vec<u8>>;
}
