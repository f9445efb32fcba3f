//! Traffic-switching algorithm shared by the `immediate` and
//! `progressive` strategies: a single stepped walk through a
//! percentage schedule, observing health after
//! every step. `immediate` is just this walk with a one-element
//! schedule `[100]`, which is also what makes the "single-step
//! schedule behaves exactly like immediate switching" property hold
//! without a second code path.

use crate::core::dpa::DataPlane;
use crate::core::monitor::{observe_for, AutoRollbackThresholds, HealthMetrics};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy)]
pub enum ProgressiveSwitchOutcome {
    Completed { final_percentage: u8 },
    Aborted { at_percentage: u8, trigger: HealthMetrics },
}

/// Walks `steps` in order, setting `dpa`'s traffic percentage at each
/// step and then observing for `observation` before advancing. Aborts
/// at the first step whose observation window reports an unhealthy
/// sample, leaving traffic at that step's percentage for the caller to
/// roll back from.
pub async fn run_progressive_switch(
    dpa: &dyn DataPlane,
    steps: &[u8],
    observation: Duration,
    thresholds: &AutoRollbackThresholds,
    metrics: &mut watch::Receiver<HealthMetrics>,
) -> Result<ProgressiveSwitchOutcome, crate::core::dpa::DpaError> {
    for &step in steps {
        dpa.set_traffic_percentage(step).await?;
        if let Some(trigger) = observe_for(observation, metrics, thresholds).await {
            return Ok(ProgressiveSwitchOutcome::Aborted { at_percentage: step, trigger });
        }
    }
    Ok(ProgressiveSwitchOutcome::Completed {
        final_percentage: steps.last().copied().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dpa::memory::MemoryDataPlane;

    fn thresholds() -> AutoRollbackThresholds {
        AutoRollbackThresholds {
            error_rate_pct: 5.0,
            response_time_ms: 2000,
            consistency_pct: 95.0,
        }
    }

    #[tokio::test]
    async fn a_single_step_schedule_switches_straight_to_100() {
        let dpa = MemoryDataPlane::new();
        let (_tx, mut rx) = watch::channel(HealthMetrics::default());
        let outcome = run_progressive_switch(&dpa, &[100], Duration::from_millis(5), &thresholds(), &mut rx).await.unwrap();
        assert!(matches!(outcome, ProgressiveSwitchOutcome::Completed { final_percentage: 100 }));
        assert_eq!(dpa.traffic_percentage().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn an_unhealthy_sample_aborts_at_the_current_step() {
        let dpa = MemoryDataPlane::new();
        let (tx, mut rx) = watch::channel(HealthMetrics::default());
        tx.send(HealthMetrics {
            error_rate_pct: 50.0,
            ..HealthMetrics::default()
        })
        .unwrap();
        let outcome = run_progressive_switch(&dpa, &[10, 25, 100], Duration::from_millis(50), &thresholds(), &mut rx)
            .await
            .unwrap();
        assert!(matches!(outcome, ProgressiveSwitchOutcome::Aborted { at_percentage: 10, .. }));
    }
}
