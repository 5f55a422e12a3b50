use crate::animation::ease::Ease;

/// Opacity animation driven by the configurator clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tween {
    from: f32,
    to: f32,
    start_ms: f64,
    duration_ms: f64,
    ease: Ease,
}

impl Tween {
    pub fn new(from: f32, to: f32, start_ms: f64, duration_ms: f64, ease: Ease) -> Self {
        Self {
            from,
            to,
            start_ms,
            duration_ms: duration_ms.max(0.0),
            ease,
        }
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self, now_ms: f64) -> f64 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0)
    }

    pub fn value_at(&self, now_ms: f64) -> f32 {
        self.ease
            .interpolate(f64::from(self.from), f64::from(self.to), self.progress(now_ms))
            as f32
    }

    pub fn is_done(&self, now_ms: f64) -> bool {
        self.progress(now_ms) >= 1.0
    }
}

/// An opacity value with at most one running tween (last writer wins).
#[derive(Clone, Debug, PartialEq)]
pub struct Animated {
    value: f32,
    tween: Option<Tween>,
}

impl Animated {
    pub fn new(value: f32) -> Self {
        Self { value, tween: None }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// Jump to `value`, dropping any running tween.
    pub fn set(&mut self, value: f32) {
        self.tween = None;
        self.value = value;
    }

    /// Drop the running tween, keeping the current value.
    pub fn cancel(&mut self) -> bool {
        self.tween.take().is_some()
    }

    /// Start animating towards `to`, replacing any running tween.
    pub fn animate(&mut self, from: f32, to: f32, now_ms: f64, duration_ms: f64, ease: Ease) {
        self.value = from;
        let tween = Tween::new(from, to, now_ms, duration_ms, ease);
        if tween.is_done(now_ms) {
            self.set(to);
        } else {
            self.tween = Some(tween);
        }
    }

    /// Advance to `now_ms`; returns `true` when a tween finished.
    pub fn advance(&mut self, now_ms: f64) -> bool {
        let Some(tween) = self.tween else {
            return false;
        };
        self.value = tween.value_at(now_ms);
        if tween.is_done(now_ms) {
            self.value = tween.target();
            self.tween = None;
            return true;
        }
        false
    }
}
