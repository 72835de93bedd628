use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseCatalog {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub data: Vec<Family>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Family {
    pub name: String,
    #[serde(default)]
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    /// Product code such as `jdk-6u13-oth-JPR`.
    #[serde(rename = "name")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub files: Vec<ArtifactFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFile {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "filepath")]
    pub download_path: String,
}

impl ReleaseCatalog {
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("failed to parse release catalog")
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|family| family.releases.is_empty())
    }

    /// First release, in family order, whose id matches `candidate_id`.
    pub fn release(&self, candidate_id: &str) -> Option<&Release> {
        self.data
            .iter()
            .flat_map(|family| family.releases.iter())
            .find(|release| release.matches(candidate_id))
    }

    pub fn releases(&self) -> impl Iterator<Item = (&Family, &Release)> {
        self.data
            .iter()
            .flat_map(|family| family.releases.iter().map(move |release| (family, release)))
    }
}

impl Release {
    /// Accepts both the bare id and the legacy `id@SITE` composite form.
    pub fn matches(&self, candidate_id: &str) -> bool {
        match candidate_id.strip_prefix(self.id.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('@'),
            None => false,
        }
    }
}
