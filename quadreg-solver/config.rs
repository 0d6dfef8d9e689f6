use quadreg_core::{RegConfig, MAX_TEMPLATE_DIMENSION};

use crate::error::{RegError, RegResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete solver configuration: template grid geometry plus the shared
/// algorithm knobs.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Core registration configuration (levels, ratio, normalization).
    pub core: RegConfig,
    /// Template pixel-grid dimensions at full resolution.
    pub template_width: usize,
    pub template_height: usize,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl SolverConfig {
    /// Create a new configuration with default algorithm settings.
    pub fn new(template_width: usize, template_height: usize) -> Self {
        Self {
            core: RegConfig::default(),
            template_width,
            template_height,
            name: None,
            description: None,
        }
    }

    /// Fast preset: shallow pyramid for small displacements.
    pub fn fast_preset(template_width: usize, template_height: usize) -> Self {
        Self {
            core: RegConfig {
                levels: 2,
                level_ratio: 0.5,
                normalization: 1.0 / 255.0,
            },
            template_width,
            template_height,
            name: Some("Fast".to_string()),
            description: Some("Two levels, optimized for small displacements".to_string()),
        }
    }

    /// Precise preset: deeper pyramid with a gentler resize ratio for
    /// larger initial misalignments.
    pub fn precise_preset(template_width: usize, template_height: usize) -> Self {
        Self {
            core: RegConfig {
                levels: 4,
                level_ratio: 0.6,
                normalization: 1.0 / 255.0,
            },
            template_width,
            template_height,
            name: Some("Precise".to_string()),
            description: Some("Four levels for larger initial misalignments".to_string()),
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "SolverConfig: template {}x{}, levels={}, ratio={}, normalization={}",
            self.template_width,
            self.template_height,
            self.core.levels,
            self.core.level_ratio,
            self.core.normalization
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> RegResult<()> {
        if self.template_width < 2
            || self.template_width > MAX_TEMPLATE_DIMENSION
            || self.template_height < 2
            || self.template_height > MAX_TEMPLATE_DIMENSION
        {
            return Err(RegError::InvalidTemplateDimension {
                width: self.template_width,
                height: self.template_height,
            });
        }
        if self.core.levels == 0 {
            return Err(RegError::InvalidLevelCount(self.core.levels));
        }
        if !(self.core.level_ratio > 0.0 && self.core.level_ratio < 1.0) {
            return Err(RegError::InvalidLevelRatio(self.core.level_ratio));
        }
        if !(self.core.normalization > 0.0) {
            return Err(RegError::InvalidNormalization(self.core.normalization));
        }
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_construction_is_valid() {
        assert!(SolverConfig::new(128, 96).validate().is_ok());
        assert!(SolverConfig::fast_preset(64, 64).validate().is_ok());
        assert!(SolverConfig::precise_preset(64, 64).validate().is_ok());
    }

    #[test]
    fn rejects_template_dimensions() {
        let cfg = SolverConfig::new(1, 100);
        assert!(matches!(
            cfg.validate(),
            Err(RegError::InvalidTemplateDimension { width: 1, .. })
        ));
        let cfg = SolverConfig::new(4001, 100);
        assert!(matches!(
            cfg.validate(),
            Err(RegError::InvalidTemplateDimension { width: 4001, .. })
        ));
    }

    #[test]
    fn rejects_bad_level_settings() {
        let mut cfg = SolverConfig::new(64, 64);
        cfg.core.levels = 0;
        assert_eq!(cfg.validate(), Err(RegError::InvalidLevelCount(0)));

        let mut cfg = SolverConfig::new(64, 64);
        cfg.core.level_ratio = 1.0;
        assert_eq!(cfg.validate(), Err(RegError::InvalidLevelRatio(1.0)));

        let mut cfg = SolverConfig::new(64, 64);
        cfg.core.level_ratio = -0.5;
        assert_eq!(cfg.validate(), Err(RegError::InvalidLevelRatio(-0.5)));

        let mut cfg = SolverConfig::new(64, 64);
        cfg.core.normalization = 0.0;
        assert_eq!(cfg.validate(), Err(RegError::InvalidNormalization(0.0)));
    }

    #[test]
    fn metadata_and_summary() {
        let cfg = SolverConfig::new(32, 24).with_metadata("Test", "unit test config");
        assert_eq!(cfg.name.as_deref(), Some("Test"));
        assert!(cfg.summary().contains("32x24"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_roundtrip() {
        let cfg = SolverConfig::precise_preset(80, 60);
        let json = cfg.to_json().unwrap();
        let back = SolverConfig::from_json(&json).unwrap();
        assert_eq!(back.template_width, 80);
        assert_eq!(back.core.levels, 4);
        assert_eq!(back.name.as_deref(), Some("Precise"));
    }
}
