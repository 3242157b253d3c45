use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Timing configuration for one training session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// total session length in seconds
    pub duration_secs: u64,
    /// smallest gap inserted between two consecutive cues
    pub min_break_secs: f64,
    /// largest gap inserted between two consecutive cues
    pub max_break_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 300,
            min_break_secs: 5.0,
            max_break_secs: 30.0,
        }
    }
}

impl SessionConfig {
    /// Width of the break interval, clamped so a misconfigured
    /// `max < min` degenerates to a fixed gap of `min` instead of
    /// producing negative offsets.
    fn break_range_width(&self) -> f64 {
        (self.max_break_secs - self.min_break_secs).max(0.0)
    }
}

/// A command the caller wants scheduled, with how many times it should
/// appear in the session. Callers pass only playable commands (audio
/// present) with `repeats > 0`.
#[derive(Debug, Clone)]
pub struct PlannedCommand {
    pub id: String,
    pub name: String,
    pub repeats: u32,
}

/// One cue in a generated schedule: which command plays, and when
/// (seconds relative to session start).
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub command_id: String,
    pub name: String,
    pub offset_secs: f64,
}

/// Generate the cue schedule for a session.
///
/// Expands each command into the multiset of its repeats, shuffles the
/// multiset (Fisher-Yates, unbiased given a uniform source), then walks
/// the shuffled order inserting a random break before each cue. Entries
/// whose offset reaches the session duration are dropped; offsets are
/// non-decreasing, so everything after the first drop is dropped too.
///
/// Deterministic for a seeded `rng`.
pub fn generate<R: Rng>(
    items: &[PlannedCommand],
    config: &SessionConfig,
    rng: &mut R,
) -> Vec<ScheduleEntry> {
    let mut pool: Vec<&PlannedCommand> = Vec::new();
    for item in items {
        for _ in 0..item.repeats {
            pool.push(item);
        }
    }

    pool.shuffle(rng);

    let width = config.break_range_width();
    let duration = config.duration_secs as f64;

    let mut schedule = Vec::with_capacity(pool.len());
    let mut offset = 0.0_f64;
    for item in pool {
        offset += config.min_break_secs + rng.gen::<f64>() * width;
        if offset < duration {
            schedule.push(ScheduleEntry {
                command_id: item.id.clone(),
                name: item.name.clone(),
                offset_secs: offset,
            });
        }
    }

    schedule
}
