use crate::signature::{RenderParams, VisualConfig};

/// Everything needed to address one rendered frame.
#[derive(Clone, Copy, Debug)]
pub struct ImageQuery<'a> {
    /// Canonical frame key (`side-3`).
    pub frame: &'a str,
    /// Product configuration being rendered.
    pub config: &'a VisualConfig,
    /// Size, format and background.
    pub params: &'a RenderParams,
}

/// Everything needed to address one index mask (or one part overlay).
#[derive(Clone, Copy, Debug)]
pub struct MaskQuery<'a> {
    /// Canonical frame key (`side-3`).
    pub frame: &'a str,
    /// Product configuration being rendered.
    pub config: &'a VisualConfig,
    /// Size of the mask (format and background do not apply).
    pub params: &'a RenderParams,
    /// `None` for the full index mask, `Some(part)` for a highlight overlay.
    pub part: Option<&'a str>,
}

/// Maps visual parameters to image URLs.
///
/// Implementations must be deterministic: identical queries yield identical
/// URLs, which is what cache-hit detection relies on.
pub trait UrlResolver {
    /// URL of the rendered frame image.
    fn image_url(&self, query: &ImageQuery<'_>) -> String;

    /// URL of the index mask or of a part overlay mask.
    fn mask_url(&self, query: &MaskQuery<'_>) -> String;
}

/// Resolver for a remote compose/mask HTTP API.
#[derive(Clone, Debug)]
pub struct QueryUrlResolver {
    base_url: String,
}

impl QueryUrlResolver {
    /// Resolve against `base_url` (trailing slashes are ignored).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    fn model_query(config: &VisualConfig) -> String {
        let mut q = format!("brand={}&model={}", config.brand, config.model);
        if let Some(variant) = &config.variant {
            q.push_str(&format!("&variant={variant}"));
        }
        q
    }
}

impl UrlResolver for QueryUrlResolver {
    fn image_url(&self, query: &ImageQuery<'_>) -> String {
        let config = query.config;
        let mut q = Self::model_query(config);

        let mut names = config.parts.keys().collect::<Vec<_>>();
        names.sort();
        for name in names {
            let choice = &config.parts[name];
            q.push_str(&format!("&p={name}:{}:{}", choice.material, choice.color));
        }
        if let Some(initials) = &config.initials {
            q.push_str(&format!("&initials={}", initials.text));
            if let Some(engraving) = &initials.engraving {
                q.push_str(&format!("&engraving={engraving}"));
            }
        }

        q.push_str(&format!("&frame={}", query.frame));
        push_dimensions(&mut q, query.params);
        if let Some(format) = &query.params.format {
            q.push_str(&format!("&format={format}"));
        }
        if let Some(background) = &query.params.background {
            q.push_str(&format!("&background={background}"));
        }
        format!("{}/compose?{q}", self.base_url)
    }

    fn mask_url(&self, query: &MaskQuery<'_>) -> String {
        let mut q = Self::model_query(query.config);
        q.push_str(&format!("&frame={}", query.frame));
        push_dimensions(&mut q, query.params);
        if let Some(part) = query.part {
            q.push_str(&format!("&part={part}"));
        }
        format!("{}/mask?{q}", self.base_url)
    }
}

fn push_dimensions(q: &mut String, params: &RenderParams) {
    match params.size {
        Some(size) => q.push_str(&format!("&size={size}")),
        None => q.push_str(&format!("&width={}&height={}", params.width, params.height)),
    }
}

/// Resolver for a pre-rendered directory layout.
///
/// Frames live at `frames/<frame>.<ext>`, index masks at `masks/<frame>.png`
/// and part overlays at `masks/<part>/<frame>.png`. Colors are not encoded: a
/// directory holds exactly one configuration.
#[derive(Clone, Debug)]
pub struct DirUrlResolver {
    extension: String,
}

impl DirUrlResolver {
    /// Frames stored with the given file extension.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl Default for DirUrlResolver {
    fn default() -> Self {
        Self::new("png")
    }
}

impl UrlResolver for DirUrlResolver {
    fn image_url(&self, query: &ImageQuery<'_>) -> String {
        let ext = query.params.format.as_deref().unwrap_or(&self.extension);
        format!("frames/{}.{ext}", query.frame)
    }

    fn mask_url(&self, query: &MaskQuery<'_>) -> String {
        match query.part {
            Some(part) => format!("masks/{part}/{}.png", query.frame),
            None => format!("masks/{}.png", query.frame),
        }
    }
}
