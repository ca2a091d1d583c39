use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DownloaderError;

/// Active game version + loader pair every project and version is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compatibility {
    pub game_version: String,
    pub loader: String,
}

impl Compatibility {
    pub fn new(game_version: impl Into<String>, loader: impl Into<String>) -> Self {
        Self {
            game_version: game_version.into(),
            loader: loader.into(),
        }
    }

    pub fn matches(&self, loaders: &[String], game_versions: &[String]) -> bool {
        loaders.iter().any(|loader| loader == &self.loader)
            && game_versions
                .iter()
                .any(|version| version == &self.game_version)
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.loader, self.game_version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Mod,
    Modpack,
    Resourcepack,
    Shader,
}

impl ProjectType {
    pub fn directory_name(self) -> &'static str {
        match self {
            ProjectType::Mod => "mods",
            ProjectType::Modpack => "modpacks",
            ProjectType::Resourcepack => "resourcepacks",
            ProjectType::Shader => "shaderpacks",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectType::Mod => write!(f, "mod"),
            ProjectType::Modpack => write!(f, "modpack"),
            ProjectType::Resourcepack => write!(f, "resourcepack"),
            ProjectType::Shader => write!(f, "shader"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Required,
    Optional,
    Incompatible,
    Embedded,
}

impl DependencyType {
    /// Whether the dependency's project joins the resolved set.
    pub fn must_fetch(self) -> bool {
        match self {
            DependencyType::Required => true,
            DependencyType::Optional => false,
            DependencyType::Incompatible => true,
            DependencyType::Embedded => true,
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::Required => write!(f, "required"),
            DependencyType::Optional => write!(f, "optional"),
            DependencyType::Incompatible => write!(f, "incompatible"),
            DependencyType::Embedded => write!(f, "embedded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    GameVersion,
    Loader,
}

impl TagKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            TagKind::GameVersion => "tag/game_version",
            TagKind::Loader => "tag/loader",
        }
    }

    /// Key of the tag object that carries the comparable value.
    pub fn value_key(self) -> &'static str {
        match self {
            TagKind::GameVersion => "version",
            TagKind::Loader => "name",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::GameVersion => write!(f, "game version"),
            TagKind::Loader => write!(f, "loader"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef(String);

impl CollectionRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CollectionRef {
    type Err = DownloaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let candidate = if url_regex().is_match(trimmed) {
            let without_query = trimmed
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .trim_end_matches('/');
            without_query
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        } else {
            trimmed.to_string()
        };

        if !id_regex().is_match(&candidate) {
            return Err(DownloaderError::InvalidCollectionRef(value.to_string()));
        }
        Ok(Self(candidate))
    }
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://[^/]+/").expect("valid url regex"))
}

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid id regex"))
}
