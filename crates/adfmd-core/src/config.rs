// SPDX-License-Identifier: AGPL-3.0-or-later
//! TOML configuration bundling render and parse settings
//!
//! ```toml
//! [render]
//! indent = "    "
//! annotate_doc = true
//!
//! [parse]
//! indent = "    "
//! strict = true
//! ```

use crate::traits::{ConversionError, ParseConfig, RenderConfig, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub parse: ParseConfig,
}

impl Config {
    /// Load from TOML text; missing keys take their defaults
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(input).map_err(|e| ConversionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ConversionError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        for (section, indent) in [("render", &self.render.indent), ("parse", &self.parse.indent)] {
            if indent.is_empty() || indent.chars().any(|c| c != ' ' && c != '\t') {
                return Err(ConversionError::Config(format!(
                    "{section}.indent must be non-empty whitespace, got {indent:?}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str("[parse]\nstrict = true\n").unwrap();
        assert!(config.parse.strict);
        assert_eq!(config.parse.indent, "  ");
        assert!(!config.render.annotate_doc);
    }

    #[test]
    fn test_rejects_bad_indent() {
        let err = Config::from_toml_str("[render]\nindent = \"\"\n").unwrap_err();
        assert!(matches!(err, ConversionError::Config(_)));
        assert!(Config::from_toml_str("[parse]\nindent = \"->\"\n").is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = Config::from_toml_str("[render\n").unwrap_err();
        assert!(matches!(err, ConversionError::Config(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.render.indent = "    ".to_string();
        config.parse.strict = true;
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
