use async_trait::async_trait;

use super::transform::RigidTransform;
use crate::common::SyncResult;

/// What the host simulation calls once per time step to move the body.
#[async_trait]
pub trait SolidBodyMotion: Send {
    async fn transformation(&mut self) -> SyncResult<RigidTransform>;
}
