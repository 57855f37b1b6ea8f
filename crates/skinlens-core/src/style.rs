//! Makeup style catalog, parsed from TOML into typed records at startup.

use crate::features::Feature;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

const BUILTIN_STYLES: &str = include_str!("../../../contrib/makeup/styles.toml");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read style catalog {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("bad style catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("style catalog is empty")]
    Empty,
    #[error("style {name}: opacity {opacity} outside [0, 1]")]
    InvalidOpacity { name: String, opacity: f32 },
    #[error("style {0} defined more than once")]
    Duplicate(String),
    #[error("default style {0} is not in the catalog")]
    UnknownDefault(String),
}

/// RGB color per feature. Every feature must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureColors {
    pub lip_upper: [u8; 3],
    pub lip_lower: [u8; 3],
    pub eyebrow_left: [u8; 3],
    pub eyebrow_right: [u8; 3],
    pub eyeliner_left: [u8; 3],
    pub eyeliner_right: [u8; 3],
    pub eyeshadow_left: [u8; 3],
    pub eyeshadow_right: [u8; 3],
}

impl FeatureColors {
    pub fn get(&self, feature: Feature) -> [u8; 3] {
        match feature {
            Feature::LipUpper => self.lip_upper,
            Feature::LipLower => self.lip_lower,
            Feature::EyebrowLeft => self.eyebrow_left,
            Feature::EyebrowRight => self.eyebrow_right,
            Feature::EyelinerLeft => self.eyeliner_left,
            Feature::EyelinerRight => self.eyeliner_right,
            Feature::EyeshadowLeft => self.eyeshadow_left,
            Feature::EyeshadowRight => self.eyeshadow_right,
        }
    }
}

/// A named catalog entry: per-feature colors and the overlay opacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MakeupStyle {
    pub name: String,
    pub opacity: f32,
    pub colors: FeatureColors,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    style: Vec<MakeupStyle>,
}

/// Immutable set of styles, looked up by exact name.
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: Vec<MakeupStyle>,
}

impl StyleCatalog {
    /// natural, dramatic, sweet and party.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(BUILTIN_STYLES)
    }

    /// Load a replacement catalog from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let src = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml(&src)?;
        tracing::info!(path = %path.display(), styles = catalog.styles.len(), "loaded style catalog");
        Ok(catalog)
    }

    pub fn from_toml(src: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(src)?;
        if file.style.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for style in &file.style {
            if !(0.0..=1.0).contains(&style.opacity) {
                return Err(CatalogError::InvalidOpacity {
                    name: style.name.clone(),
                    opacity: style.opacity,
                });
            }
            if !seen.insert(style.name.as_str()) {
                return Err(CatalogError::Duplicate(style.name.clone()));
            }
        }
        Ok(Self { styles: file.style })
    }

    pub fn get(&self, name: &str) -> Option<&MakeupStyle> {
        self.styles.iter().find(|s| s.name == name)
    }

    /// Look up the style a server starts with.
    pub fn default_style(&self, name: &str) -> Result<&MakeupStyle, CatalogError> {
        self.get(name).ok_or_else(|| CatalogError::UnknownDefault(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.styles.iter().map(|s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_STYLE: &str = r#"
        [[style]]
        name = "mono"
        opacity = 0.5

        [style.colors]
        lip_upper = [1, 2, 3]
        lip_lower = [1, 2, 3]
        eyebrow_left = [1, 2, 3]
        eyebrow_right = [1, 2, 3]
        eyeliner_left = [1, 2, 3]
        eyeliner_right = [1, 2, 3]
        eyeshadow_left = [1, 2, 3]
        eyeshadow_right = [9, 8, 7]
    "#;

    #[test]
    fn test_builtin_catalog() {
        let catalog = StyleCatalog::builtin().unwrap();
        let names: Vec<_> = catalog.names().collect();
        assert_eq!(names, ["natural", "dramatic", "sweet", "party"]);

        let natural = catalog.get("natural").unwrap();
        assert!((natural.opacity - 0.2).abs() < 1e-6);
        assert_eq!(natural.colors.get(Feature::LipUpper), [180, 0, 0]);

        let party = catalog.get("party").unwrap();
        assert_eq!(party.colors.get(Feature::EyeshadowLeft), [255, 165, 0]);
        assert_eq!(party.colors.get(Feature::EyebrowRight), [51, 51, 51]);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let catalog = StyleCatalog::builtin().unwrap();
        assert!(catalog.contains("sweet"));
        assert!(!catalog.contains("Sweet"));
        assert!(!catalog.contains("gothic"));
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = StyleCatalog::from_toml(ONE_STYLE).unwrap();
        let mono = catalog.get("mono").unwrap();
        assert_eq!(mono.colors.get(Feature::EyeshadowRight), [9, 8, 7]);
    }

    #[test]
    fn test_invalid_opacity() {
        let src = ONE_STYLE.replace("opacity = 0.5", "opacity = 1.5");
        assert!(matches!(
            StyleCatalog::from_toml(&src),
            Err(CatalogError::InvalidOpacity { .. })
        ));
    }

    #[test]
    fn test_duplicate_style() {
        let src = format!("{ONE_STYLE}\n{ONE_STYLE}");
        assert!(matches!(StyleCatalog::from_toml(&src), Err(CatalogError::Duplicate(_))));
    }

    #[test]
    fn test_missing_color_rejected() {
        let src = ONE_STYLE.replace("eyeshadow_right = [9, 8, 7]", "");
        assert!(matches!(StyleCatalog::from_toml(&src), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_unknown_default() {
        let catalog = StyleCatalog::builtin().unwrap();
        assert_eq!(catalog.default_style("natural").unwrap().name, "natural");
        assert!(matches!(catalog.default_style("Natural"), Err(CatalogError::UnknownDefault(_))));
    }

    #[test]
    fn test_empty_catalog() {
        assert!(matches!(StyleCatalog::from_toml("style = []"), Err(CatalogError::Empty)));
    }
}
