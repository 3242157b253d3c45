use crate::schedule::{self, PlannedCommand, ScheduleEntry, SessionConfig};
use rand::Rng;
use std::collections::HashMap;

/// How long a finished session lingers on the completion screen before
/// terminating itself.
pub const COMPLETION_GRACE_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Terminated,
}

/// Events pushed to the caller as the session advances. `CuePlay`
/// carries the display name so the shell can render the banner without
/// a lookup; actual audio output is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CuePlay { command_id: String, name: String },
    Completed,
    Terminated,
}

/// Live training session: a generated schedule driven against a
/// pausable wall clock.
///
/// The session owns no timer and never reads a clock. Every method
/// that involves time takes `now_ms` (epoch or any monotonic origin,
/// as long as the caller is consistent), so the state machine can be
/// driven by the 100 ms runtime tick in production and by a hand-rolled
/// clock in tests.
#[derive(Debug)]
pub struct TrainingSession {
    schedule: Vec<ScheduleEntry>,
    config: SessionConfig,
    phase: SessionPhase,
    cursor: usize,
    elapsed_secs: u64,
    started_at_ms: u64,
    paused_total_ms: u64,
    pause_started_ms: Option<u64>,
    completed_at_ms: Option<u64>,
    tally: HashMap<String, u32>,
}

impl TrainingSession {
    pub fn new(schedule: Vec<ScheduleEntry>, config: SessionConfig) -> Self {
        Self {
            schedule,
            config,
            phase: SessionPhase::Idle,
            cursor: 0,
            elapsed_secs: 0,
            started_at_ms: 0,
            paused_total_ms: 0,
            pause_started_ms: None,
            completed_at_ms: None,
            tally: HashMap::new(),
        }
    }

    /// Generate a schedule from the given commands and start the
    /// session in one step.
    pub fn begin<R: Rng>(
        items: &[PlannedCommand],
        config: SessionConfig,
        rng: &mut R,
        now_ms: u64,
    ) -> Self {
        let schedule = schedule::generate(items, &config, rng);
        let mut session = Self::new(schedule, config);
        session.start(now_ms);
        session
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn duration_secs(&self) -> u64 {
        self.config.duration_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        self.config.duration_secs.saturating_sub(self.elapsed_secs)
    }

    /// 0.0 .. 1.0 progress through the session duration.
    pub fn progress(&self) -> f64 {
        if self.config.duration_secs == 0 {
            return 0.0;
        }
        (self.elapsed_secs as f64 / self.config.duration_secs as f64).min(1.0)
    }

    pub fn cues_planned(&self) -> usize {
        self.schedule.len()
    }

    pub fn cues_played(&self) -> usize {
        self.cursor
    }

    /// Offset of the next undispatched cue, if any remain.
    pub fn next_cue_offset(&self) -> Option<f64> {
        self.schedule.get(self.cursor).map(|e| e.offset_secs)
    }

    /// Session-scoped play counts, keyed by command id.
    pub fn tally(&self) -> &HashMap<String, u32> {
        &self.tally
    }

    pub fn is_over(&self) -> bool {
        self.phase == SessionPhase::Terminated
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle -> Running. No-op in any other phase.
    pub fn start(&mut self, now_ms: u64) {
        if self.phase != SessionPhase::Idle {
            return;
        }
        self.phase = SessionPhase::Running;
        self.started_at_ms = now_ms;
        self.elapsed_secs = 0;
        self.cursor = 0;
        self.paused_total_ms = 0;
        self.tally.clear();
    }

    /// Running -> Paused. No-op in any other phase.
    pub fn pause(&mut self, now_ms: u64) {
        if self.phase != SessionPhase::Running {
            return;
        }
        self.phase = SessionPhase::Paused;
        self.pause_started_ms = Some(now_ms);
    }

    /// Paused -> Running. The paused interval is added to the
    /// accumulator before ticking resumes, so elapsed time is
    /// unaffected by wall-clock time spent paused.
    pub fn resume(&mut self, now_ms: u64) {
        if self.phase != SessionPhase::Paused {
            return;
        }
        if let Some(pause_started) = self.pause_started_ms.take() {
            self.paused_total_ms += now_ms.saturating_sub(pause_started);
        }
        self.phase = SessionPhase::Running;
    }

    /// Explicit end from Running, Paused or Completed. Emits exactly
    /// one `Terminated`; repeated calls (and calls after the grace
    /// auto-termination) are no-ops. Termination wins over any cue
    /// still due: nothing dispatches once this has been observed.
    pub fn end(&mut self) -> Vec<SessionEvent> {
        match self.phase {
            SessionPhase::Running | SessionPhase::Paused | SessionPhase::Completed => {
                self.phase = SessionPhase::Terminated;
                vec![SessionEvent::Terminated]
            }
            SessionPhase::Idle | SessionPhase::Terminated => Vec::new(),
        }
    }

    /// Advance the session to `now_ms`. Call on every runtime tick.
    ///
    /// While Running this recomputes elapsed time, transitions to
    /// Completed when the duration is reached (a cue due on the same
    /// tick loses to completion), and otherwise drains every cue whose
    /// offset has passed, in schedule order. While Completed it fires
    /// the grace auto-termination. All other phases ignore ticks.
    pub fn tick(&mut self, now_ms: u64) -> Vec<SessionEvent> {
        match self.phase {
            SessionPhase::Running => self.tick_running(now_ms),
            SessionPhase::Completed => self.tick_completed(now_ms),
            _ => Vec::new(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn tick_running(&mut self, now_ms: u64) -> Vec<SessionEvent> {
        let wall_ms = now_ms
            .saturating_sub(self.started_at_ms)
            .saturating_sub(self.paused_total_ms);
        // Clamp non-decreasing so a backward host-clock jump cannot
        // rewind the cursor's frame of reference.
        self.elapsed_secs = (wall_ms / 1000).max(self.elapsed_secs);

        if self.elapsed_secs >= self.config.duration_secs {
            self.phase = SessionPhase::Completed;
            self.completed_at_ms = Some(now_ms);
            return vec![SessionEvent::Completed];
        }

        let mut events = Vec::new();
        while self.cursor < self.schedule.len()
            && self.schedule[self.cursor].offset_secs <= self.elapsed_secs as f64
        {
            let entry = &self.schedule[self.cursor];
            *self.tally.entry(entry.command_id.clone()).or_insert(0) += 1;
            events.push(SessionEvent::CuePlay {
                command_id: entry.command_id.clone(),
                name: entry.name.clone(),
            });
            self.cursor += 1;
        }
        events
    }

    fn tick_completed(&mut self, now_ms: u64) -> Vec<SessionEvent> {
        match self.completed_at_ms {
            Some(completed_at) if now_ms >= completed_at + COMPLETION_GRACE_MS => {
                self.phase = SessionPhase::Terminated;
                vec![SessionEvent::Terminated]
            }
            _ => Vec::new(),
        }
    }
}
