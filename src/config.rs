use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// User preferences from `<config dir>/prefs.toml`. Every field is optional;
/// CLI flags and the environment override whatever is set here.
#[derive(Deserialize, Default, Debug, PartialEq, Eq)]
pub struct Config {
  pub api_key: Option<String>,
  pub query: Option<String>,
  pub page_size: Option<usize>,
  pub failure_policy: Option<String>,
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "ytpage")
}

impl Config {
  pub fn path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("prefs.toml"))
  }

  /// Load prefs, falling back to defaults when the file is missing or unreadable.
  pub fn load() -> Self {
    Self::path().map(|p| Self::load_from(&p)).unwrap_or_default()
  }

  pub fn load_from(path: &Path) -> Self {
    if let Ok(content) = std::fs::read_to_string(path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }
    Self::default()
  }
}
