use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::foundation::error::{ConfiguratorError, ConfiguratorResult};
use crate::frame::key::ViewMap;
use crate::signature::{PartChoice, VisualConfig};

/// Frame and part inventory of one product configuration.
///
/// The host fetches this once per brand/model/variant change and hands it to
/// [`crate::Configurator::load_product`].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProductSpec {
    /// Brand identifier.
    #[serde(default)]
    pub brand: String,
    /// Model identifier.
    #[serde(default)]
    pub model: String,
    /// Optional model variant.
    #[serde(default)]
    pub variant: Option<String>,
    /// View name to frame count.
    pub frames: ViewMap,
    /// Default choice for every part of the product.
    #[serde(default)]
    pub defaults: BTreeMap<String, PartChoice>,
    /// Parts that exist in masks but are not selectable.
    #[serde(default)]
    pub hidden: Vec<String>,
}

impl ProductSpec {
    /// Parse a product description from JSON text.
    pub fn from_json_str(s: &str) -> ConfiguratorResult<Self> {
        let spec: Self = serde_json::from_str(s)
            .map_err(|e| ConfiguratorError::validation(format!("product json: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Read and parse a product description file.
    pub fn from_path(path: &Path) -> ConfiguratorResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read '{}': {e}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Reject inventories the configurator cannot display.
    pub fn validate(&self) -> ConfiguratorResult<()> {
        if self.frames.is_empty() {
            return Err(ConfiguratorError::validation("product has no views"));
        }
        if self.defaults.len() > 255 {
            return Err(ConfiguratorError::validation(
                "masks encode at most 255 parts",
            ));
        }
        Ok(())
    }

    /// Sorted part names; mask index `i` maps to `parts_list()[i - 1]`.
    ///
    /// Hidden parts keep their slot so mask indices stay aligned.
    pub fn parts_list(&self) -> Vec<String> {
        self.defaults.keys().cloned().collect()
    }

    /// Parts excluded from selection and highlighting.
    pub fn hidden_set(&self) -> BTreeSet<String> {
        self.hidden.iter().cloned().collect()
    }

    /// Visual configuration made of the default part choices.
    pub fn default_config(&self) -> VisualConfig {
        VisualConfig {
            brand: self.brand.clone(),
            model: self.model.clone(),
            variant: self.variant.clone(),
            parts: self
                .defaults
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<_, _>>(),
            initials: None,
        }
    }
}
