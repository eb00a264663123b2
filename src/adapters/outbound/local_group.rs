use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{Barrier, Mutex};

use crate::common::{GroupError, GroupResult};
use crate::domains::coupling::{ProcessGroup, LEADER_RANK};

const BROADCAST_CAPACITY: usize = 4;

enum MemberLink {
    Leader(broadcast::Sender<Vec<u8>>),
    Follower(Mutex<broadcast::Receiver<Vec<u8>>>),
}

/// In-process worker group: each member is meant to be driven by its own tokio task.
///
/// Every member must take part in every collective call, as with any
/// message-passing group; a member that stops calling stalls the others.
pub struct LocalProcessGroup;

impl LocalProcessGroup {
    /// Creates `size` members, rank 0 being the leader.
    pub fn spawn(size: usize) -> GroupResult<Vec<LocalGroupMember>> {
        if size == 0 {
            return Err(GroupError::EmptyGroup);
        }

        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        let barrier = Arc::new(Barrier::new(size));

        let mut members = Vec::with_capacity(size);
        for rank in 1..size {
            members.push(LocalGroupMember {
                rank,
                size,
                link: MemberLink::Follower(Mutex::new(sender.subscribe())),
                barrier: barrier.clone(),
            });
        }
        members.insert(
            0,
            LocalGroupMember {
                rank: LEADER_RANK,
                size,
                link: MemberLink::Leader(sender),
                barrier,
            },
        );
        Ok(members)
    }
}

pub struct LocalGroupMember {
    rank: usize,
    size: usize,
    link: MemberLink,
    barrier: Arc<Barrier>,
}

#[async_trait]
impl ProcessGroup for LocalGroupMember {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn broadcast(&self, bytes: Vec<u8>) -> GroupResult<Vec<u8>> {
        let received = match &self.link {
            MemberLink::Leader(sender) => {
                if self.size > 1 {
                    sender
                        .send(bytes.clone())
                        .map_err(|_| GroupError::Disconnected { rank: self.rank })?;
                }
                bytes
            }
            MemberLink::Follower(receiver) => {
                let mut receiver = receiver.lock().await;
                match receiver.recv().await {
                    Ok(bytes) => bytes,
                    Err(RecvError::Closed) => {
                        return Err(GroupError::Disconnected { rank: self.rank })
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        return Err(GroupError::Lagged { rank: self.rank, skipped })
                    }
                }
            }
        };

        // Nobody leaves the collective before every member holds the payload.
        self.barrier.wait().await;
        Ok(received)
    }
}
