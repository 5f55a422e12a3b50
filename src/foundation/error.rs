/// Convenience result type used across the configurator.
pub type ConfiguratorResult<T> = Result<T, ConfiguratorError>;

/// Top-level error taxonomy used by configurator APIs.
///
/// Cancellation is deliberately absent: a superseded operation resolves with
/// [`crate::PreloadResult::Canceled`] instead of failing.
#[derive(thiserror::Error, Debug)]
pub enum ConfiguratorError {
    /// A frame key could not be parsed or names a view the product does not have.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The `(view, position)` pair is outside the frame count of its view.
    #[error("frame out of range: {frame} (view has {frames} frames)")]
    FrameOutOfRange {
        /// Canonical key of the rejected frame.
        frame: String,
        /// Frame count of the requested view.
        frames: u32,
    },

    /// Fetching or decoding an image (or mask) failed.
    #[error("image load error for '{url}': {reason}")]
    ImageLoad {
        /// URL that was being fetched.
        url: String,
        /// Reason reported by the image source.
        reason: String,
    },

    /// Invalid options, product data or host input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConfiguratorError {
    /// Build a [`ConfiguratorError::InvalidFrame`] value.
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Build a [`ConfiguratorError::FrameOutOfRange`] value.
    pub fn out_of_range(frame: impl Into<String>, frames: u32) -> Self {
        Self::FrameOutOfRange {
            frame: frame.into(),
            frames,
        }
    }

    /// Build a [`ConfiguratorError::ImageLoad`] value.
    pub fn image_load(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImageLoad {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`ConfiguratorError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
