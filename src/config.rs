use crate::animation::ease::Ease;
use crate::foundation::error::{ConfiguratorError, ConfiguratorResult};
use crate::signature::RenderParams;

/// How a newly drawn frame replaces the visible one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Swap buffers immediately.
    #[default]
    Instant,
    /// Fade the new frame in over the old one.
    Simple,
    /// Fade the old frame out while the new one fades in.
    Cross,
}

/// Configurator options. Unknown JSON fields are rejected; missing ones default.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfiguratorOpts {
    pub width: u32,
    pub height: u32,
    /// Square size; overrides `width`/`height` when set.
    pub size: Option<u32>,
    pub format: Option<String>,
    pub background: Option<String>,
    /// Size used in fullscreen mode.
    pub max_size: u32,
    /// Device pixels per logical pixel of the frame surfaces.
    pub pixel_ratio: f64,
    /// Drag sensitivity; frames per full element width, scaled by the view's frame count.
    pub sensitivity: f64,
    /// Vertical drag (in `sensitivity * fraction of height` units) that switches view.
    pub vertical_threshold: f64,
    /// Horizontal drag fraction above which a pointer-up is not a click.
    pub click_threshold: f64,
    /// Default transition duration in milliseconds.
    pub duration: f64,
    /// Delay before background preloading starts, in milliseconds.
    pub preload_delay: f64,
    pub mask_opacity: f32,
    /// Highlight fade duration in milliseconds.
    pub mask_duration: f64,
    /// Wait between a mask load and reading it, in milliseconds.
    pub mask_settle: f64,
    /// Load index masks and allow highlight/selection.
    pub use_masks: bool,
    /// Initial view.
    pub view: String,
    /// Initial position within `view`.
    pub position: u32,
    /// Transition used after a product change.
    pub config_animate: Transition,
    /// Transition used when the view changes.
    pub view_animate: Transition,
    /// Preload one frame at a time instead of all at once.
    pub use_chain: bool,
    /// Default full-turn duration for timed rotations, in milliseconds.
    pub revolution_duration: Option<f64>,
    pub ease: Ease,
}

impl Default for ConfiguratorOpts {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            size: None,
            format: None,
            background: None,
            max_size: 1000,
            pixel_ratio: 2.0,
            sensitivity: 40.0,
            vertical_threshold: 15.0,
            click_threshold: 0.015,
            duration: 500.0,
            preload_delay: 150.0,
            mask_opacity: 0.4,
            mask_duration: 150.0,
            mask_settle: 150.0,
            use_masks: false,
            view: "side".to_string(),
            position: 0,
            config_animate: Transition::Cross,
            view_animate: Transition::Cross,
            use_chain: false,
            revolution_duration: None,
            ease: Ease::Linear,
        }
    }
}

impl ConfiguratorOpts {
    /// Parse options from JSON, applying defaults for missing fields.
    pub fn from_json_str(s: &str) -> ConfiguratorResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| ConfiguratorError::validation(format!("options json: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> ConfiguratorResult<()> {
        let (w, h) = self.dimensions();
        if w == 0 || h == 0 {
            return Err(ConfiguratorError::validation("size must be non-zero"));
        }
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(ConfiguratorError::validation("pixel_ratio must be > 0"));
        }
        for (name, v) in [
            ("duration", self.duration),
            ("preload_delay", self.preload_delay),
            ("mask_duration", self.mask_duration),
            ("mask_settle", self.mask_settle),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ConfiguratorError::validation(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        if let Some(rev) = self.revolution_duration
            && !(rev.is_finite() && rev > 0.0)
        {
            return Err(ConfiguratorError::validation(
                "revolution_duration must be > 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.mask_opacity) {
            return Err(ConfiguratorError::validation(
                "mask_opacity must be in [0, 1]",
            ));
        }
        Ok(())
    }

    /// Logical `(width, height)` after applying `size`.
    pub fn dimensions(&self) -> (u32, u32) {
        match self.size {
            Some(size) => (size, size),
            None => (self.width, self.height),
        }
    }

    /// Device-pixel size of the frame surfaces.
    pub fn surface_dimensions(&self) -> (u32, u32) {
        let (w, h) = self.dimensions();
        let scale = |v: u32| ((f64::from(v) * self.pixel_ratio).round() as u32).max(1);
        (scale(w), scale(h))
    }

    /// Parameters passed to the URL resolver and folded into the signature.
    pub fn render_params(&self) -> RenderParams {
        RenderParams {
            size: self.size,
            width: self.width,
            height: self.height,
            format: self.format.clone(),
            background: self.background.clone(),
        }
    }
}

/// Per-call options of [`crate::Configurator::update`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateOpts {
    /// Redraw even when the signature and frame are unchanged.
    pub force: bool,
    /// Preload the other frames; defaults to "signature changed or never preloaded".
    pub preload: Option<bool>,
    /// Transition; defaults to `Simple` when the signature changed, else `Instant`.
    pub transition: Option<Transition>,
    /// Transition duration; defaults to the configured duration.
    pub duration: Option<f64>,
    /// Override the configured preload mode.
    pub use_chain: Option<bool>,
}

/// Per-call options of [`crate::Configurator::change_frame`].
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeFrameOpts {
    pub transition: Option<Transition>,
    /// Total rotation duration in milliseconds.
    pub duration: Option<f64>,
    /// Duration of one rotation step in milliseconds.
    pub step_duration: Option<f64>,
    /// Duration of a full turn; converted to a per-step duration.
    pub revolution_duration: Option<f64>,
    /// Block dragging while an animated change runs.
    pub prevent_drag: bool,
    /// Defer while preloading and ignore while already animating.
    pub safe: bool,
}

impl Default for ChangeFrameOpts {
    fn default() -> Self {
        Self {
            transition: None,
            duration: None,
            step_duration: None,
            revolution_duration: None,
            prevent_drag: true,
            safe: true,
        }
    }
}
