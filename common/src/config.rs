use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::PlotError,
    group::{LoadOptions, ParsePolicy},
    plot::{ChartLayout, Renderer},
    style::StyleCycle,
};

pub const DEFAULT_INPUT: &str = "./build/output.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "./res";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub parse_policy: ParsePolicy,
    pub layout: ChartLayout,
    pub style_cycle: StyleCycle,
    /// Regex on the metric id, ie. `^write`
    pub metric_filter: Option<String>,
    /// Backend and its cosmetic options, the default backend if unset
    pub renderer: Option<Box<dyn Renderer>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            parse_policy: ParsePolicy::default(),
            layout: ChartLayout::default(),
            style_cycle: StyleCycle::default(),
            metric_filter: None,
            renderer: None,
        }
    }
}

impl Settings {
    pub fn from_yaml_file(path: &Path) -> Result<Self, PlotError> {
        let config_error = |reason: String| PlotError::Config {
            path: path.to_owned(),
            reason,
        };
        let data = read_to_string(path).map_err(|err| config_error(err.to_string()))?;
        serde_yml::from_str(&data).map_err(|err| config_error(err.to_string()))
    }

    pub fn load_options(&self) -> Result<LoadOptions, PlotError> {
        Ok(LoadOptions {
            policy: self.parse_policy,
            metric_filter: self.metric_filter.as_deref().map(Regex::new).transpose()?,
        })
    }
}
