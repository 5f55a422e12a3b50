use std::collections::BTreeMap;
use std::fmt;

use crate::foundation::error::{ConfiguratorError, ConfiguratorResult};

const SEPARATOR: char = '-';

/// A `(view, position)` pair identifying one pre-rendered frame.
///
/// The canonical string form is `"<view>-<position>"` (e.g. `side-3`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameKey {
    /// View name (`side`, `top`, `bottom`, ...).
    pub view: String,
    /// Zero-based position inside the view's rotation.
    pub position: u32,
}

impl FrameKey {
    /// Build a key without validating it against a [`ViewMap`].
    pub fn new(view: impl Into<String>, position: u32) -> Self {
        Self {
            view: view.into(),
            position,
        }
    }

    /// Parse `view-position` or a bare `view` (position 0).
    ///
    /// Only the syntax is checked here; use [`ViewMap::decode`] to validate ranges.
    pub fn parse(raw: &str) -> ConfiguratorResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfiguratorError::invalid_frame("frame key must be non-empty"));
        }

        if let Some((view, position)) = raw.rsplit_once(SEPARATOR)
            && !position.is_empty()
            && position.bytes().all(|b| b.is_ascii_digit())
        {
            if view.is_empty() {
                return Err(ConfiguratorError::invalid_frame(format!(
                    "frame key '{raw}' has no view"
                )));
            }
            let position = position.parse::<u32>().map_err(|_| {
                ConfiguratorError::invalid_frame(format!("frame key '{raw}' position overflows"))
            })?;
            return Ok(Self::new(view, position));
        }

        Ok(Self::new(raw, 0))
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.view, self.position)
    }
}

/// Frame inventory of a product: view name to number of frames.
///
/// A count of `0` or `1` means the view is a single, non-rotating image. Views
/// with a count of `0` are addressed by their name alone. Iteration order is
/// the sorted view name order, which makes preload work lists deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ViewMap {
    views: BTreeMap<String, u32>,
}

impl ViewMap {
    /// Build a view map from `(view, frame_count)` pairs.
    pub fn new<I, S>(views: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            views: views.into_iter().map(|(v, n)| (v.into(), n)).collect(),
        }
    }

    /// Declared frame count of `view`, if the product has that view.
    pub fn frames(&self, view: &str) -> Option<u32> {
        self.views.get(view).copied()
    }

    /// Number of addressable positions of `view` (at least one image per view).
    pub fn positions(&self, view: &str) -> Option<u32> {
        self.frames(view).map(|n| n.max(1))
    }

    /// Return `true` when the product has `view`.
    pub fn contains(&self, view: &str) -> bool {
        self.views.contains_key(view)
    }

    /// Return `true` when no views are defined.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// View names in deterministic order.
    pub fn views(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    /// Every addressable frame: all positions of all views, views in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = FrameKey> + '_ {
        self.views.iter().flat_map(|(view, &n)| {
            (0..n.max(1)).map(move |position| FrameKey::new(view.clone(), position))
        })
    }

    /// Validate `key` against this inventory.
    pub fn validate(&self, key: &FrameKey) -> ConfiguratorResult<()> {
        let Some(frames) = self.frames(&key.view) else {
            return Err(ConfiguratorError::invalid_frame(format!(
                "unknown view '{}'",
                key.view
            )));
        };
        if key.position >= frames.max(1) {
            return Err(ConfiguratorError::out_of_range(key.to_string(), frames));
        }
        Ok(())
    }

    /// Encode a validated `(view, position)` pair into its canonical string.
    pub fn encode(&self, view: &str, position: u32) -> ConfiguratorResult<String> {
        let key = FrameKey::new(view, position);
        self.validate(&key)?;
        Ok(self.canonical(&key))
    }

    /// Decode and validate a frame key string.
    ///
    /// Both `top` and `top-0` are accepted for single-image views.
    pub fn decode(&self, raw: &str) -> ConfiguratorResult<FrameKey> {
        let key = FrameKey::parse(raw)?;
        if !self.contains(&key.view) && self.contains(raw.trim()) {
            // view names may themselves end in "-<digits>"
            let key = FrameKey::new(raw.trim(), 0);
            self.validate(&key)?;
            return Ok(key);
        }
        self.validate(&key)?;
        Ok(key)
    }

    /// Canonical string of a key already known to be valid.
    pub fn canonical(&self, key: &FrameKey) -> String {
        match self.frames(&key.view) {
            Some(0) => key.view.clone(),
            _ => key.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frame/key.rs"]
mod tests;
