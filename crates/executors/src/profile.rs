use std::fmt;

/// One ramping instruction: move towards `target` VUs over `duration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: String,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: impl Into<String>, target: u32) -> Self {
        Self {
            duration: duration.into(),
            target,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.duration, self.target)
    }
}

/// How k6 should schedule virtual users for a run.
///
/// Durations are handed to k6 untouched; k6 owns their syntax ("30s", "1m30s", ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadProfile {
    /// Constant VU count for a fixed duration.
    Fixed { duration: String, vus: u32 },
    /// Ramp up to `max_vus`, hold, then ramp down to zero.
    Ramping {
        ramp_up: String,
        sustain: String,
        ramp_down: String,
        max_vus: u32,
    },
    /// A fixed number of iterations split across the VU pool; k6 stops once
    /// they are used up, so there is no duration.
    SharedIterations { iterations: u64, vus: u32 },
}

impl LoadProfile {
    pub fn fixed(duration: impl Into<String>, vus: u32) -> Self {
        Self::Fixed {
            duration: duration.into(),
            vus,
        }
    }

    pub fn ramping(
        ramp_up: impl Into<String>,
        sustain: impl Into<String>,
        ramp_down: impl Into<String>,
        max_vus: u32,
    ) -> Self {
        Self::Ramping {
            ramp_up: ramp_up.into(),
            sustain: sustain.into(),
            ramp_down: ramp_down.into(),
            max_vus,
        }
    }

    pub fn shared_iterations(iterations: u64, vus: u32) -> Self {
        Self::SharedIterations { iterations, vus }
    }

    /// Used in diagnostics and in the "Error executing k6 ..." prefix.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "test",
            Self::Ramping { .. } => "ramping test",
            Self::SharedIterations { .. } => "shared iterations test",
        }
    }

    /// Ramp-up, sustain and ramp-down in that order. Empty for other modes.
    pub fn stages(&self) -> Vec<Stage> {
        match self {
            Self::Ramping {
                ramp_up,
                sustain,
                ramp_down,
                max_vus,
            } => vec![
                Stage::new(ramp_up.clone(), *max_vus),
                Stage::new(sustain.clone(), *max_vus),
                Stage::new(ramp_down.clone(), 0),
            ],
            _ => Vec::new(),
        }
    }

    /// k6 arguments up to, but not including, the script path.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        match self {
            Self::Fixed { duration, vus } => {
                args.extend(["-d".to_string(), duration.clone()]);
                args.extend(["-u".to_string(), vus.to_string()]);
            }
            Self::Ramping { .. } => {
                for stage in self.stages() {
                    args.extend(["--stage".to_string(), stage.to_string()]);
                }
            }
            Self::SharedIterations { iterations, vus } => {
                args.extend(["--iterations".to_string(), iterations.to_string()]);
                args.extend(["--vus".to_string(), vus.to_string()]);
            }
        }
        args
    }
}
