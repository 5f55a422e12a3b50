use crate::frame::key::FrameKey;
use crate::preload::UpdateToken;

/// Deferred work scheduled by the configurator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Timer {
    /// Start the preload batch after its startup delay.
    PreloadStart(UpdateToken),
    /// Commit the next step of a timed rotation.
    FrameStep { seq: u64 },
    /// Copy a loaded mask into the mask surface.
    MaskSettle { frame: FrameKey, url: String },
}

#[derive(Clone, Debug)]
struct Entry {
    due_ms: f64,
    seq: u64,
    timer: Timer,
}

/// Timeout queue polled on every tick.
///
/// Timers fire in due order; timers due at the same instant fire in the
/// order they were scheduled.
#[derive(Clone, Debug, Default)]
pub(crate) struct TimerQueue {
    next_seq: u64,
    entries: Vec<Entry>,
}

impl TimerQueue {
    pub(crate) fn schedule(&mut self, due_ms: f64, timer: Timer) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.entries.push(Entry { due_ms, seq, timer });
        seq
    }

    /// Remove and return the earliest timer due at `now_ms`.
    pub(crate) fn pop_due(&mut self, now_ms: f64) -> Option<Timer> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due_ms <= now_ms)
            .min_by(|(_, a), (_, b)| a.due_ms.total_cmp(&b.due_ms).then(a.seq.cmp(&b.seq)))
            .map(|(i, _)| i)?;
        Some(self.entries.remove(idx).timer)
    }

    pub(crate) fn cancel_where(&mut self, mut pred: impl FnMut(&Timer) -> bool) {
        self.entries.retain(|e| !pred(&e.timer));
    }

    /// Due time of the earliest timer.
    pub(crate) fn next_due(&self) -> Option<f64> {
        self.entries.iter().map(|e| e.due_ms).min_by(f64::total_cmp)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
