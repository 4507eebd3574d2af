//! Scenario configuration: the validated, ready-to-run description of a
//! single channel + protocol combination, built from CLI flags or a named
//! preset.

use crate::channel::LossSchedule;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Protocol {
    Gbn,
    Sr,
    Tcp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Protocol::Gbn => "gbn",
            Protocol::Sr => "sr",
            Protocol::Tcp => "tcp",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub protocol: Protocol,
    pub loss: f64,
    pub rtt_ms: f64,
    pub jitter_ms: f64,
    pub corrupt: f64,
    pub reorder: f64,
    pub window: u32,
    pub payload_bytes: usize,
    pub mss: usize,
    pub runs: u32,
    pub cwnd_enabled: bool,
    pub seed: u64,
    /// Overrides `loss` with `initial_loss_prob` until simulated time reaches
    /// `cutover`, then falls back to the static `loss` field. `None` (the
    /// default, and the only option reachable from the CLI) keeps `loss`
    /// constant for the whole run.
    pub loss_schedule: Option<LossSchedule>,
}

impl Scenario {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.loss) {
            return Err(ConfigError::LossOutOfRange(self.loss));
        }
        if !(0.0..=1.0).contains(&self.corrupt) {
            return Err(ConfigError::CorruptOutOfRange(self.corrupt));
        }
        if !(0.0..=1.0).contains(&self.reorder) {
            return Err(ConfigError::ReorderOutOfRange(self.reorder));
        }
        if self.rtt_ms <= 0.0 {
            return Err(ConfigError::NonPositiveRtt(self.rtt_ms));
        }
        if self.jitter_ms < 0.0 {
            return Err(ConfigError::NegativeJitter(self.jitter_ms));
        }
        if self.window == 0 {
            return Err(ConfigError::ZeroWindow(self.window));
        }
        if self.mss == 0 {
            return Err(ConfigError::ZeroMss(self.mss));
        }
        if self.payload_bytes == 0 {
            return Err(ConfigError::ZeroPayload(self.payload_bytes));
        }
        if self.runs == 0 {
            return Err(ConfigError::ZeroRuns(self.runs));
        }
        Ok(())
    }

    pub fn total_segments(&self) -> u32 {
        self.payload_bytes.div_ceil(self.mss) as u32
    }

    /// Resolves a named preset (`A`..`D`) into a scenario, or `None` if the
    /// caller should fall back to building one from explicit CLI flags.
    ///
    /// These four presets roughly trace the concrete scenarios in the
    /// spec's testable-properties table: ideal, lossy, high-latency/jitter,
    /// and adversarial.
    pub fn preset(name: &str, protocol: Protocol, runs: u32, seed: u64) -> Result<Scenario, ConfigError> {
        let base = Scenario {
            protocol,
            loss: 0.0,
            rtt_ms: 50.0,
            jitter_ms: 0.0,
            corrupt: 0.0,
            reorder: 0.0,
            window: 4,
            payload_bytes: 20_000,
            mss: 1024,
            runs,
            cwnd_enabled: false,
            seed,
            loss_schedule: None,
        };
        let scenario = match name {
            "A" => base,
            "B" => Scenario { loss: 0.2, ..base },
            "C" => Scenario { rtt_ms: 100.0, jitter_ms: 20.0, window: 8, ..base },
            "D" => Scenario { loss: 0.1, corrupt: 0.05, reorder: 0.1, window: 8, ..base },
            other => return Err(ConfigError::UnknownPreset(other.to_string())),
        };
        Ok(scenario)
    }
}
