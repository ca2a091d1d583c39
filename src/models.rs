use serde::{Deserialize, Serialize};

use crate::domain::{DependencyType, ProjectType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub project_type: ProjectType,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(rename = "versions", default)]
    pub version_ids: Vec<String>,
}

impl Project {
    pub fn page_url(&self) -> String {
        let handle = self.slug.as_deref().unwrap_or(&self.id);
        format!("https://modrinth.com/{}/{handle}", self.project_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub version_number: String,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub date_published: Option<String>,
}

impl Version {
    pub fn primary_file(&self) -> Option<&VersionFile> {
        self.files.iter().find(|file| file.primary)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionFile {
    #[serde(rename = "filename")]
    pub file_name: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    pub dependency_type: DependencyType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "projects", default)]
    pub project_ids: Vec<String>,
}

impl Collection {
    pub fn page_url(&self) -> String {
        format!("https://modrinth.com/collection/{}", self.id)
    }
}

/// A project paired with the version chosen for download.
#[derive(Debug, Clone)]
pub struct Entry {
    pub project: Project,
    pub version: Version,
}
