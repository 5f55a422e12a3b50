use std::collections::HashMap;
use std::fmt;

use crate::frame::key::FrameKey;

/// Material and color picked for one part.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PartChoice {
    /// Material name.
    pub material: String,
    /// Color name.
    pub color: String,
}

impl PartChoice {
    /// Build a choice from material and color names.
    pub fn new(material: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            color: color.into(),
        }
    }
}

/// Personalization text rendered onto the product.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Initials {
    /// The initials text.
    pub text: String,
    /// Engraving profile (e.g. `gold`), if any.
    #[serde(default)]
    pub engraving: Option<String>,
}

/// Owner state that affects the rendered pixels.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VisualConfig {
    /// Brand identifier.
    pub brand: String,
    /// Model identifier.
    pub model: String,
    /// Optional model variant.
    #[serde(default)]
    pub variant: Option<String>,
    /// Current part selections, in no particular order.
    #[serde(default)]
    pub parts: HashMap<String, PartChoice>,
    /// Optional personalization.
    #[serde(default)]
    pub initials: Option<Initials>,
}

/// Rendering parameters that affect the requested images.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderParams {
    /// Square size; overrides `width` and `height` when set.
    pub size: Option<u32>,
    /// Requested width.
    pub width: u32,
    /// Requested height.
    pub height: u32,
    /// Image format (`png`, `jpeg`, ...).
    pub format: Option<String>,
    /// Background color (hex without `#`).
    pub background: Option<String>,
}

impl RenderParams {
    /// Effective `(width, height)` after applying `size`.
    pub fn dimensions(&self) -> (u32, u32) {
        match self.size {
            Some(size) => (size, size),
            None => (self.width, self.height),
        }
    }
}

/// Dirty-checking signature of everything that affects visual output.
///
/// Two equal signatures imply identical pixels for the same frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Signature text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compact 64-bit digest, used to keep log lines short.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1a64::new(0xcbf29ce484222325);
        h.write_bytes(self.0.as_bytes());
        h.finish()
    }

    /// Fold a frame into the signature, giving the "unique" marker of one draw.
    pub fn unique_for(&self, frame: &FrameKey) -> String {
        format!("{}&view={}&position={}", self.0, frame.view, frame.position)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the signature for a configuration and its render parameters.
///
/// Parts are emitted in sorted name order, so the insertion order of
/// `config.parts` never changes the result.
pub fn compute_signature(config: &VisualConfig, params: &RenderParams) -> Signature {
    let mut out = format!("brand={}&model={}", config.brand, config.model);
    if let Some(variant) = &config.variant {
        out.push_str(&format!("&variant={variant}"));
    }

    let mut names = config.parts.keys().collect::<Vec<_>>();
    names.sort();
    for name in names {
        let choice = &config.parts[name];
        out.push_str(&format!("&p={name}:{}:{}", choice.material, choice.color));
    }

    match &config.initials {
        Some(initials) => {
            out.push_str(&format!("&initials={}", initials.text));
            if let Some(engraving) = &initials.engraving {
                out.push_str(&format!("&engraving={engraving}"));
            }
        }
        None => out.push_str("&initials="),
    }

    let (width, height) = params.dimensions();
    out.push_str(&format!(
        "&width={width}&height={height}&format={}&background={}",
        params.format.as_deref().unwrap_or(""),
        params.background.as_deref().unwrap_or("")
    ));
    Signature(out)
}

/// Tracks the last signature (and frame) committed by a successful update.
#[derive(Clone, Debug, Default)]
pub struct SignatureTracker {
    committed: Option<Signature>,
    unique: Option<String>,
}

impl SignatureTracker {
    /// Create an empty tracker (everything is dirty).
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature of the last committed update.
    pub fn committed(&self) -> Option<&Signature> {
        self.committed.as_ref()
    }

    /// Return `true` when `signature` differs from the committed one.
    pub fn is_dirty(&self, signature: &Signature) -> bool {
        self.committed.as_ref() != Some(signature)
    }

    /// Return `true` when `unique` (signature + frame) was already drawn.
    pub fn is_redundant(&self, unique: &str) -> bool {
        self.unique.as_deref() == Some(unique)
    }

    /// Record a successful visual operation.
    pub fn commit(&mut self, signature: Signature, unique: String) {
        self.committed = Some(signature);
        self.unique = Some(unique);
    }

    /// Forget the committed markers so the next identical request is retried.
    pub fn rollback(&mut self) {
        self.committed = None;
        self.unique = None;
    }
}

#[derive(Clone, Copy)]
struct Fnv1a64(u64);

impl Fnv1a64 {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        self.0 = h;
    }

    fn finish(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
#[path = "../tests/unit/signature.rs"]
mod tests;
