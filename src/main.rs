use serde::Serialize;
use sixdof_cosim::adapters::outbound::{init_combined_logger, init_rank_logger, LocalProcessGroup};
use sixdof_cosim::application::StepSynchronizer;
use sixdof_cosim::domains::coupling::ProcessGroup;
use sixdof_cosim::domains::motion::SolidBodyMotion;
use sixdof_cosim::{ApplicationError, Config, SyncError};
use std::error::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct StepReport {
    step: u64,
    translation: [f64; 3],
    rotation: [f64; 4],
}

struct WorkerSummary {
    rank: usize,
    steps: u64,
    digest: u64,
    outcome: Option<SyncError>,
}

/// Runs the host side of the step loop for one worker until it halts or hits `max_steps`.
async fn drive<M: SolidBodyMotion>(
    motion: &mut M,
    rank: usize,
    max_steps: Option<u64>,
) -> WorkerSummary {
    let mut steps = 0;
    let mut digest = 0u64;
    loop {
        if max_steps.is_some_and(|max| steps >= max) {
            return WorkerSummary { rank, steps, digest, outcome: None };
        }
        match motion.transformation().await {
            Ok(transform) => {
                steps += 1;
                for bits in transform.to_bits() {
                    digest = digest.rotate_left(7) ^ bits;
                }
                if rank == 0 {
                    let [tx, ty, tz, qw, qi, qj, qk] = transform.to_components();
                    let report = StepReport {
                        step: steps,
                        translation: [tx, ty, tz],
                        rotation: [qw, qi, qj, qk],
                    };
                    match serde_json::to_string(&report) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!("Failed to render step report: {}", e),
                    }
                }
            }
            Err(e) => return WorkerSummary { rank, steps, digest, outcome: Some(e) },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("COSIM_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load_layered(&config_path).map_err(ApplicationError::Configuration)?;
    let level = config.log_level().map_err(ApplicationError::Configuration)?;
    let logger = init_combined_logger(config.logging.file.as_deref(), level);

    info!(
        "Coupling on {} with {} worker(s)",
        config.channel_identity()?.socket_path(&config.coupling.directory).display(),
        config.group.workers
    );

    let members = LocalProcessGroup::spawn(config.group.workers)?;
    let mut handles = Vec::with_capacity(members.len());
    for member in members {
        let config = config.clone();
        let rank = member.rank();
        let logger = init_rank_logger(rank, logger.clone());
        handles.push(tokio::spawn(async move {
            match StepSynchronizer::connect(member, &config, logger).await {
                Ok(mut synchronizer) => drive(&mut synchronizer, rank, config.group.max_steps).await,
                Err(e) => WorkerSummary { rank, steps: 0, digest: 0, outcome: Some(e) },
            }
        }));
    }

    let mut summaries = Vec::with_capacity(handles.len());
    for handle in handles {
        summaries.push(handle.await.map_err(|e| ApplicationError::Worker(e.to_string()))?);
    }

    let leader = &summaries[0];
    let mut failed = false;
    for summary in &summaries {
        if summary.steps != leader.steps || summary.digest != leader.digest {
            error!(
                "Worker {} diverged: {} steps, digest {:#x} (leader {} steps, {:#x})",
                summary.rank, summary.steps, summary.digest, leader.steps, leader.digest
            );
            failed = true;
        }
        match &summary.outcome {
            None => {}
            Some(SyncError::Halted { reason, .. }) if reason.is_orderly() => {}
            Some(e) => {
                error!("Worker {} stopped: {}", summary.rank, e);
                failed = true;
            }
        }
    }

    if failed {
        return Err(ApplicationError::Worker("co-simulation ended abnormally".to_string()).into());
    }
    info!("Co-simulation finished after {} steps", leader.steps);
    Ok(())
}
