use crate::config::{ChangeFrameOpts, Transition};
use crate::events::{UpdateId, UpdateOutcome};
use crate::frame::key::FrameKey;

/// Timing inputs of a rotation within one view, all in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepTiming {
    /// Total duration of the rotation.
    pub duration: Option<f64>,
    /// Duration of each step; wins over `duration`.
    pub step_duration: Option<f64>,
    /// Duration of a full turn; wins over `step_duration`.
    pub revolution_duration: Option<f64>,
}

impl StepTiming {
    fn is_timed(&self) -> bool {
        [self.duration, self.step_duration, self.revolution_duration]
            .into_iter()
            .flatten()
            .any(|v| v > 0.0)
    }
}

/// Result of one rotation tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationTick {
    /// Position to display next.
    pub position: u32,
    /// How long to wait before displaying it.
    pub sleep_ms: f64,
    /// `position` is the target.
    pub last: bool,
}

/// Drift-tolerant stepped rotation between two positions of one view.
///
/// Steps are scheduled at `start + i * step_duration`. A tick that runs late
/// skips the steps it missed and shortens its sleep by the residual lateness,
/// so the total wall-clock duration holds under jitter.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationPlan {
    origin: u32,
    target: u32,
    frames: u32,
    step_count: u32,
    forward: bool,
    start_ms: f64,
    step_duration: f64,
    step: u32,
}

/// Shortest-path step count and direction from `from` to `to` in a ring of `frames`.
///
/// Ties go forward.
pub fn shortest_path(from: u32, to: u32, frames: u32) -> (u32, bool) {
    if frames == 0 {
        return (0, true);
    }
    let delta = from.abs_diff(to);
    let count = delta.min(frames - delta.min(frames));
    let forward = (from + count) % frames == to;
    (count, forward)
}

impl RotationPlan {
    /// Plan a rotation, or `None` when no timing applies or there is nothing to rotate.
    pub fn new(
        origin: u32,
        target: u32,
        frames: u32,
        timing: StepTiming,
        start_ms: f64,
    ) -> Option<Self> {
        if !timing.is_timed() || frames <= 1 {
            return None;
        }
        let (step_count, forward) = shortest_path(origin, target, frames);
        if step_count == 0 {
            return None;
        }

        let step_ref = match timing.revolution_duration.filter(|r| *r > 0.0) {
            Some(rev) => Some((rev / f64::from(frames)).trunc()),
            None => timing.step_duration.filter(|s| *s > 0.0),
        };
        let duration = match step_ref {
            Some(step) => step * f64::from(step_count),
            None => timing
                .duration
                .or(timing.revolution_duration)
                .unwrap_or_default(),
        };

        Some(Self {
            origin,
            target,
            frames,
            step_count,
            forward,
            start_ms,
            step_duration: (duration / f64::from(step_count)).max(0.0),
            step: 0,
        })
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn step_duration(&self) -> f64 {
        self.step_duration
    }

    /// Total planned duration in milliseconds.
    pub fn duration(&self) -> f64 {
        self.step_duration * f64::from(self.step_count)
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.step_count
    }

    /// Compute the next step at `now_ms`.
    pub fn advance(&mut self, now_ms: f64) -> RotationTick {
        let sd = self.step_duration;
        let (skip, reduced) = if sd > 0.0 {
            let expected = self.start_ms + f64::from(self.step) * sd;
            let delay = (now_ms - expected).max(0.0);
            ((delay / sd).floor(), delay % sd)
        } else {
            (f64::from(self.step_count), 0.0)
        };

        let skip = skip.min(f64::from(self.step_count)) as u32;
        self.step = (self.step + skip + 1).min(self.step_count);
        let position = self.position_at(self.step);
        RotationTick {
            position,
            sleep_ms: (sd - reduced).max(0.0),
            last: self.step >= self.step_count,
        }
    }

    fn position_at(&self, step: u32) -> u32 {
        if step >= self.step_count {
            return self.target;
        }
        let n = self.frames;
        let step = step % n;
        if self.forward {
            (self.origin + step) % n
        } else {
            (self.origin + n - step) % n
        }
    }
}

/// Where a running frame change currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AnimationPhase {
    /// Waiting for the step timer before committing the next position.
    Sleeping { seq: u64 },
    /// Waiting for the update that draws the committed position.
    Updating(UpdateId),
    /// The committed position needed no update; continue on the next tick.
    Stepped,
}

/// A live (possibly multi-tick) frame change.
#[derive(Clone, Debug)]
pub(crate) struct FrameAnimation {
    pub(crate) target: FrameKey,
    pub(crate) opts: ChangeFrameOpts,
    pub(crate) plan: Option<RotationPlan>,
    pub(crate) phase: AnimationPhase,
    /// Transition and duration of the update committed by the current step.
    pub(crate) step_transition: Transition,
    pub(crate) step_duration: f64,
    /// This change holds the no-drag flag.
    pub(crate) blocks_drag: bool,
    /// Outcome of the update committed by the last step.
    pub(crate) outcome: Option<UpdateOutcome>,
    pub(crate) first: bool,
}

impl FrameAnimation {
    pub(crate) fn new(target: FrameKey, opts: ChangeFrameOpts) -> Self {
        Self {
            target,
            opts,
            plan: None,
            phase: AnimationPhase::Stepped,
            step_transition: Transition::Instant,
            step_duration: 0.0,
            blocks_drag: false,
            outcome: None,
            first: true,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/change_frame.rs"]
mod tests;
