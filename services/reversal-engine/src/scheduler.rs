//! Periodic evaluation loop

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::SchedulerCfg;
use crate::engine::hub::{EvaluateOutcome, EvaluationHub};

/// Spawn the background task that re-evaluates the index on a fixed cadence
pub fn spawn_evaluation_task(hub: Arc<EvaluationHub>, cfg: SchedulerCfg) {
    if !cfg.enabled {
        info!("Evaluation scheduler disabled");
        return;
    }

    tokio::spawn(async move {
        // Stagger replica start so they do not fetch upstream in lockstep
        if cfg.jitter_secs > 0 {
            let delay = rand::random::<u64>() % cfg.jitter_secs;
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(cfg.interval_secs));

        loop {
            interval.tick().await;

            match hub.evaluate_once().await {
                Ok(EvaluateOutcome::Applied { .. }) => {}
                Ok(EvaluateOutcome::Superseded) => {
                    info!("Scheduled evaluation superseded by a newer request");
                }
                Ok(EvaluateOutcome::NoData) => {
                    error!("Scheduled evaluation could not obtain series data");
                }
                Err(e) => {
                    error!("Scheduled evaluation failed: {}", e);
                }
            }
        }
    });
}
