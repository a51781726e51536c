/// JSON pipeline configuration
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SplatError};
use crate::pipeline::ProcessAction;

/// One input file and the actions applied to it before combining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub actions: Vec<ProcessAction>,
}

impl InputSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            actions: Vec::new(),
        }
    }
}

/// Options for a conversion run, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Inputs in addition to those named on the command line.
    pub inputs: Vec<InputSpec>,
    /// Actions applied to the combined table.
    pub actions: Vec<ProcessAction>,
    /// Store per-chunk colour bounds when writing packed output.
    pub color_bounds: bool,
    pub overwrite: bool,
    /// Iteration count for writers that refine their output; unused by the
    /// PLY writers.
    pub iterations: u32,
    /// Passed through unchanged to viewer outputs.
    pub viewer_settings: Option<serde_json::Value>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            actions: Vec::new(),
            color_bounds: true,
            overwrite: false,
            iterations: 10,
            viewer_settings: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| SplatError::file(path, e))?;
        Self::from_json(&text)
    }

    /// Checks every action, global and per input.
    pub fn validate(&self) -> Result<()> {
        for input in &self.inputs {
            for action in &input.actions {
                action.validate()?;
            }
        }
        for action in &self.actions {
            action.validate()?;
        }
        if self.iterations == 0 {
            return Err(SplatError::config("iterations must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::KeepAmount;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = PipelineConfig::from_json(r#"{"actions": [{"kind": "summary"}]}"#).unwrap();
        assert_eq!(config.actions, vec![ProcessAction::Summary]);
        assert!(config.color_bounds);
        assert!(!config.overwrite);
        assert!(config.inputs.is_empty());
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "inputs": [{"path": "a.ply", "actions": [{"kind": "lod", "level": -1}]}],
            "actions": [{"kind": "filter-visibility", "keep": {"percent": 50.0}}],
            "colorBounds": false,
            "overwrite": true,
            "viewerSettings": {"camera": [0, 1, 2]}
        }"#;
        let config = PipelineConfig::from_json(json).unwrap();
        assert_eq!(config.inputs[0].path, PathBuf::from("a.ply"));
        assert_eq!(config.inputs[0].actions, vec![ProcessAction::Lod { level: -1 }]);
        assert_eq!(
            config.actions,
            vec![ProcessAction::FilterVisibility {
                keep: KeepAmount::Percent(50.0)
            }]
        );
        assert!(!config.color_bounds);
        assert!(config.viewer_settings.is_some());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_reaches_input_actions() {
        let mut config = PipelineConfig::default();
        config.inputs.push(InputSpec {
            path: PathBuf::from("a.ply"),
            actions: vec![ProcessAction::Scale { factor: -1.0 }],
        });
        assert!(matches!(config.validate(), Err(SplatError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_action_kind_is_json_error() {
        let result = PipelineConfig::from_json(r#"{"actions": [{"kind": "explode"}]}"#);
        assert!(matches!(result, Err(SplatError::Json(_))));
    }
}
