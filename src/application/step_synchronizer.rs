use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::adapters::inbound::CouplingChannel;
use crate::common::{GroupError, HaltReason, SyncError, SyncResult};
use crate::config::Config;
use crate::domains::coupling::{ControllerLink, ProcessGroup, RawPayload};
use crate::domains::logger::DynLogger;
use crate::domains::motion::{
    CentreOfRotation, DecodePolicy, PoseDecoder, RigidTransform, SolidBodyMotion,
};

#[derive(Debug, Clone, Copy)]
pub struct MotionSettings {
    pub centre: CentreOfRotation,
    pub decode_policy: DecodePolicy,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            centre: CentreOfRotation::origin(),
            decode_policy: DecodePolicy::Strict,
        }
    }
}

/// What the leader distributes to the group on every collective call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepMessage {
    Ready,
    Payload(RawPayload),
    Halt(HaltReason),
}

impl StepMessage {
    fn encode(&self) -> SyncResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SyncError::Group(GroupError::Encoding(e)))
    }

    fn decode(bytes: &[u8]) -> SyncResult<Self> {
        bincode::deserialize(bytes).map_err(|e| SyncError::Group(GroupError::Encoding(e)))
    }
}

/// Drives one worker of the group through the per-step coupling protocol.
///
/// Only the leader holds a [`ControllerLink`]. Each step the leader's outcome
/// (payload or halt) is broadcast, and every worker decodes and composes from
/// the same bytes, so all of them return bit-identical transforms or the same
/// halt reason. Once halted a synchronizer never touches the group again.
pub struct StepSynchronizer<G: ProcessGroup, L: ControllerLink> {
    group: G,
    link: Option<L>,
    centre: CentreOfRotation,
    decoder: PoseDecoder,
    logger: DynLogger,
    step: u64,
    halted: Option<HaltReason>,
}

impl<G: ProcessGroup, L: ControllerLink> StepSynchronizer<G, L> {
    /// Collective setup. `connect` runs on the leader only; its outcome is
    /// broadcast so a failed connection stops every worker, not just the leader.
    pub async fn establish<F, Fut>(
        group: G,
        settings: MotionSettings,
        logger: DynLogger,
        connect: F,
    ) -> SyncResult<Self>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = crate::common::SetupResult<L>> + Send,
    {
        let mut link = None;
        let mut setup_error = None;
        let announcement = if group.is_leader() {
            match connect().await {
                Ok(l) => {
                    logger.info(&format!("Controller connected on {}", l.endpoint()));
                    link = Some(l);
                    StepMessage::Ready
                }
                Err(e) => {
                    logger.error(&format!("Coupling setup failed: {}", e));
                    let reason = HaltReason::SetupFailed(e.to_string());
                    setup_error = Some(e);
                    StepMessage::Halt(reason)
                }
            }
        } else {
            StepMessage::Ready
        };

        let bytes = group.broadcast(announcement.encode()?).await?;
        match StepMessage::decode(&bytes)? {
            StepMessage::Ready => {}
            StepMessage::Halt(reason) => {
                return Err(match setup_error {
                    Some(e) => SyncError::Setup(e),
                    None => SyncError::Halted { step: 0, reason },
                });
            }
            StepMessage::Payload(_) => {
                return Err(SyncError::Halted {
                    step: 0,
                    reason: HaltReason::GroupFailure("payload received during setup".to_string()),
                });
            }
        }

        logger.info(&format!(
            "Worker {}/{} ready, centre of rotation {:?}",
            group.rank(),
            group.size(),
            settings.centre.point()
        ));

        Ok(Self {
            group,
            link,
            centre: settings.centre,
            decoder: PoseDecoder::new(settings.decode_policy),
            logger,
            step: 0,
            halted: None,
        })
    }

    pub fn is_leader(&self) -> bool {
        self.group.is_leader()
    }

    pub fn rank(&self) -> usize {
        self.group.rank()
    }

    /// Steps completed successfully so far.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn halt_reason(&self) -> Option<&HaltReason> {
        self.halted.as_ref()
    }

    /// Exchange, broadcast, decode and compose for the current step.
    pub async fn transformation(&mut self) -> SyncResult<RigidTransform> {
        let step = self.step + 1;
        if let Some(reason) = &self.halted {
            return Err(SyncError::Halted { step, reason: reason.clone() });
        }

        let outgoing = match self.link.as_mut() {
            Some(link) => match link.exchange().await {
                Ok(payload) => StepMessage::Payload(payload),
                Err(e) => {
                    self.logger.warn(&format!("Step {}: {}", step, e));
                    StepMessage::Halt(HaltReason::from(&e))
                }
            },
            None => StepMessage::Ready,
        };

        let received = match collect(&self.group, outgoing).await {
            Ok(message) => message,
            Err(e) => {
                self.halt(HaltReason::GroupFailure(e.to_string()));
                return Err(e);
            }
        };

        let payload = match received {
            StepMessage::Payload(payload) => payload,
            StepMessage::Halt(reason) => {
                self.logger.info(&format!("Step {}: halting, {}", step, reason));
                self.halt(reason.clone());
                return Err(SyncError::Halted { step, reason });
            }
            StepMessage::Ready => {
                let reason = HaltReason::GroupFailure("leader sent no payload".to_string());
                self.halt(reason.clone());
                return Err(SyncError::Halted { step, reason });
            }
        };
        self.logger.debug(&format!("Step {} data: {}", step, payload.text()));

        let decoded = match self.decoder.decode(&payload.text()) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.logger.error(&format!("Step {}: {}", step, e));
                self.halt(HaltReason::MalformedPayload(e.to_string()));
                return Err(SyncError::Decode { step, source: e });
            }
        };
        if !decoded.rejected.is_empty() {
            self.logger.warn(&format!(
                "Step {}: zeroed unparsable fields {:?}",
                step, decoded.rejected
            ));
        }

        let transform = RigidTransform::compose(&decoded.pose, &self.centre);
        self.logger.debug(&format!("Step {}: {} -> {}", step, decoded.pose, transform));

        self.step = step;
        Ok(transform)
    }

    /// Dropping the link closes the socket, so a waiting controller sees end of stream.
    fn halt(&mut self, reason: HaltReason) {
        self.halted = Some(reason);
        self.link = None;
    }
}

async fn collect<G: ProcessGroup>(group: &G, outgoing: StepMessage) -> SyncResult<StepMessage> {
    let bytes = group.broadcast(outgoing.encode()?).await?;
    StepMessage::decode(&bytes)
}

impl<G: ProcessGroup> StepSynchronizer<G, CouplingChannel> {
    /// Collective setup against a real coupling socket described by `config`.
    pub async fn connect(group: G, config: &Config, logger: DynLogger) -> SyncResult<Self> {
        let coupling = config.coupling_settings();
        let identity = config.channel_identity();
        Self::establish(group, config.motion_settings(), logger, || async move {
            CouplingChannel::open(identity?, &coupling).await
        })
        .await
    }
}

#[async_trait]
impl<G: ProcessGroup, L: ControllerLink> SolidBodyMotion for StepSynchronizer<G, L> {
    async fn transformation(&mut self) -> SyncResult<RigidTransform> {
        StepSynchronizer::transformation(self).await
    }
}
