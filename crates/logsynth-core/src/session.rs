use crate::error::ConfigError;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

/// Upper bound on `mean_session_events`. A whole session is scheduled when it
/// opens, so this also bounds the pending backlog.
pub const MAX_MEAN_SESSION_EVENTS: f64 = 1e6;

/// Timing of generated traffic.
///
/// Sessions start as a Poisson process: gaps between consecutive session
/// starts are exponential with mean `mean_session_gap_millis`. A session
/// belongs to one user and holds `1 + G` events, `G` geometric so the mean
/// length is `mean_session_events`. Events inside a session are separated by
/// exponential think times with mean `mean_think_time_millis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionModel {
    /// Timestamp of the first session, in milliseconds since the Unix epoch.
    #[serde(default = "default_start_millis")]
    pub start_millis: i64,
    #[serde(default = "default_session_gap")]
    pub mean_session_gap_millis: f64,
    #[serde(default = "default_think_time")]
    pub mean_think_time_millis: f64,
    #[serde(default = "default_session_events")]
    pub mean_session_events: f64,
}

impl SessionModel {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("mean_session_gap_millis", self.mean_session_gap_millis),
            ("mean_think_time_millis", self.mean_think_time_millis),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidTimeModel(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        let m = self.mean_session_events;
        if !(1.0..=MAX_MEAN_SESSION_EVENTS).contains(&m) {
            return Err(ConfigError::InvalidTimeModel(format!(
                "mean_session_events must lie in [1, {MAX_MEAN_SESSION_EVENTS}], got {m}"
            )));
        }
        if m > 1.0 && !(extra_events_rate(m) > 0.0) {
            return Err(ConfigError::InvalidTimeModel(format!(
                "mean_session_events {m} is too close to 1"
            )));
        }
        Ok(())
    }
}

impl Default for SessionModel {
    fn default() -> Self {
        Self {
            start_millis: default_start_millis(),
            mean_session_gap_millis: default_session_gap(),
            mean_think_time_millis: default_think_time(),
            mean_session_events: default_session_events(),
        }
    }
}

/// Running clock for a [`SessionModel`].
///
/// Offsets are kept as `f64` milliseconds from `start_millis` and floored only
/// when converted to timestamps, so rounding never accumulates and converted
/// times stay monotonic.
#[derive(Debug, Clone)]
pub struct SessionClock {
    origin: i64,
    next_start: f64,
    gap: Exp<f64>,
    think: Exp<f64>,
    /// Rate of the exponential whose floor is the number of events after
    /// the first. `None` when every session has exactly one event.
    extra: Option<Exp<f64>>,
}

impl SessionClock {
    pub fn new(model: &SessionModel) -> Result<Self, ConfigError> {
        model.validate()?;
        let gap = exp_with_mean(model.mean_session_gap_millis)?;
        let think = exp_with_mean(model.mean_think_time_millis)?;

        let m = model.mean_session_events;
        let extra = if m > 1.0 {
            let rate = extra_events_rate(m);
            Some(Exp::new(rate).map_err(|e| ConfigError::InvalidTimeModel(e.to_string()))?)
        } else {
            None
        };

        Ok(Self {
            origin: model.start_millis,
            next_start: 0.0,
            gap,
            think,
            extra,
        })
    }

    /// Timestamp at which the next session will open.
    pub fn next_start_millis(&self) -> i64 {
        self.to_millis(self.next_start)
    }

    /// Open a session: returns its start offset and schedules the next one.
    pub fn open<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        let start = self.next_start;
        self.next_start += self.gap.sample(rng);
        start
    }

    /// Number of events in a new session, at least one.
    pub fn session_length<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match &self.extra {
            Some(extra) => (extra.sample(rng).floor() as u64).saturating_add(1),
            None => 1,
        }
    }

    pub fn think_time<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.think.sample(rng)
    }

    /// Convert an offset to a timestamp.
    pub fn to_millis(&self, offset: f64) -> i64 {
        // offsets are never negative, so truncation is floor
        self.origin.saturating_add(offset as i64)
    }
}

/// floor(Exp(rate)) is geometric with P(G >= k) = e^(-rate * k); a mean of
/// m - 1 gives rate = ln(m / (m - 1)).
fn extra_events_rate(m: f64) -> f64 {
    (m / (m - 1.0)).ln()
}

fn exp_with_mean(mean: f64) -> Result<Exp<f64>, ConfigError> {
    Exp::new(1.0 / mean).map_err(|e| ConfigError::InvalidTimeModel(e.to_string()))
}

// 2013-10-28T00:00:00Z
fn default_start_millis() -> i64 {
    1_382_918_400_000
}
// One session per 864 ms is one login per user per day at 100k users.
fn default_session_gap() -> f64 {
    864.0
}
fn default_think_time() -> f64 {
    1_500.0
}
fn default_session_events() -> f64 {
    6.0
}
