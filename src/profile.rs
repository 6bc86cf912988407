//! Configurable heuristics: role keywords, status vocabulary, header-detection
//! thresholds, category count and sheet preference, loadable from YAML.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    loader::{HeaderDetection, LoadOptions},
    roles::KeywordTable,
    summary::{StatusVocabulary, SummaryOptions},
};

const DEFAULT_TOP_CATEGORIES: usize = 15;
const DEFAULT_PREFERRED_SHEET: &str = "TEC";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Opening profile {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parsing profile YAML failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub roles: KeywordTable,
    pub status: StatusVocabulary,
    pub header: HeaderDetection,
    pub top_categories: usize,
    pub preferred_sheets: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            roles: KeywordTable::default(),
            status: StatusVocabulary::default(),
            header: HeaderDetection::default(),
            top_categories: DEFAULT_TOP_CATEGORIES,
            preferred_sheets: vec![DEFAULT_PREFERRED_SHEET.to_string()],
        }
    }
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let file = File::open(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Profile = serde_yaml::from_reader(BufReader::new(file))?;
        debug!("Loaded profile from {path:?}");
        Ok(profile.normalized())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProfileError> {
        let profile: Profile = serde_yaml::from_str(yaml)?;
        Ok(profile.normalized())
    }

    pub fn to_yaml(&self) -> Result<String, ProfileError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn normalized(mut self) -> Self {
        self.roles = self.roles.normalized();
        self
    }

    /// Load options carrying this profile's header thresholds.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            header: self.header,
            ..LoadOptions::default()
        }
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            status: self.status.clone(),
            top_categories: self.top_categories,
        }
    }
}
