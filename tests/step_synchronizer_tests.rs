use async_trait::async_trait;
use sixdof_cosim::adapters::outbound::{init_noop_logger, LocalGroupMember, LocalProcessGroup};
use sixdof_cosim::application::{MotionSettings, StepSynchronizer};
use sixdof_cosim::config::{Config, CouplingConfig, MotionConfig};
use sixdof_cosim::domains::coupling::*;
use sixdof_cosim::domains::motion::*;
use sixdof_cosim::{ChannelError, ChannelResult, HaltReason, SetupError, SyncError};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Controller link that replays canned replies, then reports the peer gone.
/// Like the socket channel, it turns the termination keyword into a terminal error.
struct ScriptedLink {
    replies: VecDeque<ChannelResult<RawPayload>>,
}

impl ScriptedLink {
    fn new(messages: &[&str]) -> Self {
        let path = PathBuf::from("scripted");
        Self {
            replies: messages
                .iter()
                .map(|m| {
                    let payload = RawPayload::from_text(m);
                    if payload.is_termination() {
                        Err(ChannelError::TerminationRequested { path: path.clone() })
                    } else {
                        Ok(payload)
                    }
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ControllerLink for ScriptedLink {
    async fn exchange(&mut self) -> ChannelResult<RawPayload> {
        self.replies.pop_front().unwrap_or_else(|| {
            Err(ChannelError::PeerClosed { path: PathBuf::from("scripted") })
        })
    }

    fn endpoint(&self) -> String {
        "scripted".to_string()
    }
}

/// Every step's transform bits, and the error that ended the loop.
type WorkerRun = (Vec<[u64; 7]>, SyncError);

async fn run_until_halt<L: ControllerLink>(
    mut synchronizer: StepSynchronizer<LocalGroupMember, L>,
) -> WorkerRun {
    let mut steps = Vec::new();
    loop {
        match synchronizer.transformation().await {
            Ok(transform) => steps.push(transform.to_bits()),
            Err(e) => return (steps, e),
        }
    }
}

async fn run_scripted_group(
    size: usize,
    settings: MotionSettings,
    messages: &'static [&'static str],
) -> Vec<Result<WorkerRun, SyncError>> {
    let handles: Vec<_> = LocalProcessGroup::spawn(size)
        .unwrap()
        .into_iter()
        .map(|member| {
            tokio::spawn(async move {
                let synchronizer = StepSynchronizer::establish(
                    member,
                    settings,
                    init_noop_logger(),
                    move || async move { Ok(ScriptedLink::new(messages)) },
                )
                .await?;
                Ok::<WorkerRun, SyncError>(run_until_halt(synchronizer).await)
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn test_every_worker_gets_identical_transforms() {
    let settings = MotionSettings {
        centre: CentreOfRotation::new(0.5, -1.0, 2.0),
        decode_policy: DecodePolicy::Strict,
    };
    let messages = &["1;2;3;0.1;0.2;0.3", "0.25;0;-0.5;1.0;-0.3;0.7;99", "1;2"];
    let results = run_scripted_group(4, settings, messages).await;

    let expected: Vec<[u64; 7]> = messages
        .iter()
        .map(|m| {
            let pose = PoseDecoder::default().decode(m).unwrap().pose;
            RigidTransform::compose(&pose, &settings.centre).to_bits()
        })
        .collect();

    for result in results {
        let (steps, err) = result.unwrap();
        assert_eq!(steps, expected);
        assert_eq!(err.halt_reason(), Some(&HaltReason::PeerClosed));
    }
}

#[tokio::test]
async fn test_termination_is_reported_on_every_worker_and_sticks() {
    let members = LocalProcessGroup::spawn(3).unwrap();
    let handles: Vec<_> = members
        .into_iter()
        .map(|member| {
            tokio::spawn(async move {
                let mut synchronizer = StepSynchronizer::establish(
                    member,
                    MotionSettings::default(),
                    init_noop_logger(),
                    || async { Ok(ScriptedLink::new(&["1;1;1", "exit", "2;2;2"])) },
                )
                .await
                .unwrap();

                assert!(synchronizer.transformation().await.is_ok());
                let first = synchronizer.transformation().await.unwrap_err();
                let second = synchronizer.transformation().await.unwrap_err();
                (first, second, synchronizer.step())
            })
        })
        .collect();

    for handle in handles {
        let (first, second, step) = handle.await.unwrap();
        assert!(matches!(
            first,
            SyncError::Halted { step: 2, reason: HaltReason::TerminationRequested }
        ));
        assert!(matches!(
            second,
            SyncError::Halted { step: 2, reason: HaltReason::TerminationRequested }
        ));
        assert_eq!(step, 1);
    }
}

#[tokio::test]
async fn test_strict_decode_failure_halts_every_worker() {
    let results = run_scripted_group(2, MotionSettings::default(), &["1;2;3", "1;abc;3", "4;5;6"]).await;

    for result in results {
        let (steps, err) = result.unwrap();
        assert_eq!(steps.len(), 1);
        match err {
            SyncError::Decode { step: 2, source } => {
                assert!(source.to_string().contains("abc"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_zero_fill_policy_keeps_group_running() {
    let settings = MotionSettings {
        centre: CentreOfRotation::origin(),
        decode_policy: DecodePolicy::ZeroFill,
    };
    let results = run_scripted_group(3, settings, &["1;oops;3"]).await;

    let expected = RigidTransform::compose(
        &Pose::new(nalgebra::Vector3::new(1.0, 0.0, 3.0), nalgebra::Vector3::zeros()),
        &settings.centre,
    )
    .to_bits();
    for result in results {
        let (steps, _) = result.unwrap();
        assert_eq!(steps, vec![expected]);
    }
}

#[tokio::test]
async fn test_leader_setup_failure_stops_followers() {
    let members = LocalProcessGroup::spawn(3).unwrap();
    let handles: Vec<_> = members
        .into_iter()
        .map(|member| {
            tokio::spawn(async move {
                StepSynchronizer::<_, ScriptedLink>::establish(
                    member,
                    MotionSettings::default(),
                    init_noop_logger(),
                    || async {
                        Err(SetupError::PathInUse { path: PathBuf::from("./exchange1.sock") })
                    },
                )
                .await
                .err()
                .unwrap()
            })
        })
        .collect();

    let mut errors = Vec::new();
    for handle in handles {
        errors.push(handle.await.unwrap());
    }
    assert!(matches!(errors[0], SyncError::Setup(SetupError::PathInUse { .. })));
    for err in &errors[1..] {
        match err {
            SyncError::Halted { step: 0, reason: HaltReason::SetupFailed(msg) } => {
                assert!(msg.contains("exchange1.sock"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

async fn connect_controller(path: &Path) -> UnixStream {
    for _ in 0..200 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("coupling socket {:?} never came up", path);
}

async fn send(controller: &mut UnixStream, msg: &str) {
    controller.write_all(msg.as_bytes()).await.unwrap();
    let mut ack = [0u8; MAX_PAYLOAD_BYTES];
    controller.read_exact(&mut ack).await.unwrap();
    assert_eq!(ack[0], b'\n');
}

fn socket_config(dir: &Path, socket_id: f64, centre: [f64; 3]) -> Config {
    Config {
        coupling: CouplingConfig {
            socket_id,
            directory: dir.to_path_buf(),
            response_timeout_ms: None,
        },
        motion: MotionConfig {
            centre_of_rotation: centre,
            decode_policy: DecodePolicy::Strict,
        },
        ..Config::default()
    }
}

#[tokio::test]
async fn test_socket_driven_group_stays_consistent_until_exit() {
    let dir = tempdir().unwrap();
    let config = socket_config(dir.path(), 11.0, [1.0, 2.0, 3.0]);
    let path = dir.path().join("exchange11.sock");

    let handles: Vec<_> = LocalProcessGroup::spawn(3)
        .unwrap()
        .into_iter()
        .map(|member| {
            let config = config.clone();
            tokio::spawn(async move {
                let mut synchronizer =
                    StepSynchronizer::connect(member, &config, init_noop_logger()).await.unwrap();
                let (steps, err) = {
                    let mut steps = Vec::new();
                    loop {
                        match synchronizer.transformation().await {
                            Ok(t) => steps.push(t.to_bits()),
                            Err(e) => break (steps, e),
                        }
                    }
                };
                // Halted workers answer immediately on later steps too.
                let again = synchronizer.transformation().await.unwrap_err();
                (steps, err, again)
            })
        })
        .collect();

    let messages = ["0.1;0.2;0.3;0.01;0.02;0.03", "1;0;0;0;0;1.5707963267948966", "\n"];
    let mut controller = connect_controller(&path).await;
    for msg in messages {
        send(&mut controller, msg).await;
    }
    send(&mut controller, "exit").await;

    let centre = CentreOfRotation::new(1.0, 2.0, 3.0);
    let expected: Vec<[u64; 7]> = messages
        .iter()
        .map(|m| {
            let pose = PoseDecoder::default().decode(m).unwrap().pose;
            RigidTransform::compose(&pose, &centre).to_bits()
        })
        .collect();

    for handle in handles {
        let (steps, err, again) = handle.await.unwrap();
        assert_eq!(steps, expected);
        assert!(matches!(
            err,
            SyncError::Halted { step: 4, reason: HaltReason::TerminationRequested }
        ));
        assert_eq!(again.halt_reason(), Some(&HaltReason::TerminationRequested));
    }
    assert!(!path.exists());
}

#[tokio::test]
async fn test_controller_disconnect_halts_every_worker() {
    let dir = tempdir().unwrap();
    let config = socket_config(dir.path(), 12.0, [0.0, 0.0, 0.0]);
    let path = dir.path().join("exchange12.sock");

    let handles: Vec<_> = LocalProcessGroup::spawn(2)
        .unwrap()
        .into_iter()
        .map(|member| {
            let config = config.clone();
            tokio::spawn(async move {
                let synchronizer =
                    StepSynchronizer::connect(member, &config, init_noop_logger()).await.unwrap();
                run_until_halt(synchronizer).await
            })
        })
        .collect();

    let mut controller = connect_controller(&path).await;
    send(&mut controller, "1;2;3;4;5;6").await;
    drop(controller);

    for handle in handles {
        let (steps, err) = handle.await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(err.halt_reason(), Some(&HaltReason::PeerClosed));
    }
}

async fn query_host_motion<M: sixdof_cosim::SolidBodyMotion>(motion: &mut M) -> RigidTransform {
    motion.transformation().await.unwrap()
}

#[tokio::test]
async fn test_synchronizer_answers_host_motion_queries() {
    let member = LocalProcessGroup::spawn(1).unwrap().pop().unwrap();
    assert_eq!(member.rank(), sixdof_cosim::ports::LEADER_RANK);

    let mut synchronizer = StepSynchronizer::establish(
        member,
        MotionSettings::default(),
        init_noop_logger(),
        || async { Ok(ScriptedLink::new(&["1;0;0"])) },
    )
    .await
    .unwrap();

    let transform = query_host_motion(&mut synchronizer).await;
    assert_eq!(transform.to_components()[0], -1.0);
}
