//! Folds a scenario's per-run results into the aggregate row the CLI
//! prints: mean time, mean goodput, mean retransmissions, with failed
//! (timed-out) runs counted but excluded from the means.

use crate::config::Protocol;
use crate::driver::RunResult;
use crate::error::RunError;

#[derive(Debug, Clone)]
pub struct ScenarioSummary {
    pub protocol: Protocol,
    pub mean_time_s: Option<f64>,
    pub mean_throughput_bps: Option<f64>,
    pub mean_retransmissions: Option<f64>,
    pub runs_ok: u32,
    pub runs_failed: u32,
}

pub fn aggregate(protocol: Protocol, outcomes: &[Result<RunResult, RunError>]) -> ScenarioSummary {
    let ok: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    let runs_failed = (outcomes.len() - ok.len()) as u32;

    if ok.is_empty() {
        return ScenarioSummary {
            protocol,
            mean_time_s: None,
            mean_throughput_bps: None,
            mean_retransmissions: None,
            runs_ok: 0,
            runs_failed,
        };
    }

    let n = ok.len() as f64;
    let mean_time_s = ok.iter().map(|r| r.wall_sim.as_secs_f64()).sum::<f64>() / n;
    let mean_throughput_bps = ok.iter().map(|r| r.throughput_bps).sum::<f64>() / n;
    let mean_retransmissions = ok.iter().map(|r| r.retransmissions as f64).sum::<f64>() / n;

    ScenarioSummary {
        protocol,
        mean_time_s: Some(mean_time_s),
        mean_throughput_bps: Some(mean_throughput_bps),
        mean_retransmissions: Some(mean_retransmissions),
        runs_ok: ok.len() as u32,
        runs_failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok(time_s: f64, retx: u64) -> Result<RunResult, RunError> {
        Ok(RunResult {
            wall_sim: Duration::from_secs_f64(time_s),
            throughput_bps: 1000.0,
            retransmissions: retx,
            delivered_bytes: 1000,
            channel_stats: Default::default(),
        })
    }

    fn timed_out() -> Result<RunResult, RunError> {
        Err(RunError::Timeout(Duration::from_secs(600)))
    }

    #[test]
    fn averages_only_successful_runs() {
        let outcomes = vec![ok(1.0, 0), ok(3.0, 2), timed_out()];
        let summary = aggregate(Protocol::Gbn, &outcomes);
        assert_eq!(summary.runs_ok, 2);
        assert_eq!(summary.runs_failed, 1);
        assert_eq!(summary.mean_time_s, Some(2.0));
        assert_eq!(summary.mean_retransmissions, Some(1.0));
    }

    #[test]
    fn all_failed_reports_none_rather_than_dividing_by_zero() {
        let outcomes = vec![timed_out(), timed_out()];
        let summary = aggregate(Protocol::Sr, &outcomes);
        assert_eq!(summary.runs_ok, 0);
        assert_eq!(summary.runs_failed, 2);
        assert!(summary.mean_time_s.is_none());
    }
}
