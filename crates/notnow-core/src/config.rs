use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grammar::DEFAULT_MARKER;

pub const DEFAULT_SNAPSHOT_MAX_AGE_MINUTES: i64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotnowConfig {
    /// Token that introduces a command, e.g. "/notnow".
    pub marker: Option<String>,
    /// Embedded snapshots older than this are re-derived by replay.
    pub snapshot_max_age_minutes: Option<i64>,
    /// Recorded as the author of snapshot refreshes when the caller names nobody.
    pub default_user: Option<String>,
}

impl NotnowConfig {
    pub fn marker(&self) -> &str {
        self.marker
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_MARKER)
    }

    pub fn snapshot_max_age(&self) -> Duration {
        Duration::minutes(
            self.snapshot_max_age_minutes
                .filter(|minutes| *minutes >= 0)
                .unwrap_or(DEFAULT_SNAPSHOT_MAX_AGE_MINUTES),
        )
    }
}

pub fn config_filename_candidates() -> [&'static str; 2] {
    [".notnow.toml", ".notnowrc"]
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(".notnow.toml")
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"].iter().find_map(|key| {
        std::env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

pub fn resolve_notnow_home_dir() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("NOTNOW_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".notnow"))
}

pub fn global_config_path() -> Option<PathBuf> {
    resolve_notnow_home_dir().map(|home| home.join("config.toml"))
}

/// Nearest ancestor of `start` (inclusive) holding a project config file.
pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|candidate| {
            config_filename_candidates()
                .iter()
                .any(|name| candidate.join(name).is_file())
        })
        .map(Path::to_path_buf)
}

fn read_config(path: &Path) -> Option<NotnowConfig> {
    let text = fs::read_to_string(path).ok()?;
    toml::from_str::<NotnowConfig>(&text).ok()
}

pub fn load_config(root: &Path) -> Option<NotnowConfig> {
    config_filename_candidates()
        .into_iter()
        .map(|name| root.join(name))
        .filter(|path| path.is_file())
        .find_map(|path| read_config(&path))
}

pub fn load_global_config() -> Option<NotnowConfig> {
    let path = global_config_path()?;
    if !path.is_file() {
        return None;
    }
    read_config(&path)
}

pub fn write_config(root: &Path, config: &NotnowConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path(root);
    let body = toml::to_string_pretty(config)?;
    fs::write(&path, body)?;
    Ok(path)
}

fn resolve_with_source<T>(
    start: &Path,
    pick: impl Fn(NotnowConfig) -> Option<T>,
) -> Option<(T, &'static str)> {
    if let Some(value) = find_config_root(start)
        .and_then(|root| load_config(&root))
        .and_then(&pick)
    {
        return Some((value, "project"));
    }
    load_global_config().and_then(&pick).map(|value| (value, "global"))
}

pub fn resolve_marker_with_source(start: &Path) -> (String, &'static str) {
    resolve_with_source(start, |config| {
        config
            .marker
            .map(|marker| marker.trim().to_string())
            .filter(|marker| !marker.is_empty())
    })
    .unwrap_or_else(|| (DEFAULT_MARKER.to_string(), "default"))
}

pub fn resolve_snapshot_max_age_with_source(start: &Path) -> (Duration, &'static str) {
    resolve_with_source(start, |config| {
        config
            .snapshot_max_age_minutes
            .filter(|minutes| *minutes >= 0)
    })
    .map(|(minutes, source)| (Duration::minutes(minutes), source))
    .unwrap_or((
        Duration::minutes(DEFAULT_SNAPSHOT_MAX_AGE_MINUTES),
        "default",
    ))
}

pub fn resolve_default_user_with_source(start: &Path) -> (Option<String>, &'static str) {
    resolve_with_source(start, |config| config.default_user)
        .map(|(user, source)| (Some(user), source))
        .unwrap_or((None, "default"))
}

/// Effective configuration for `start`, each key resolved independently.
pub fn resolve_config(start: &Path) -> NotnowConfig {
    NotnowConfig {
        marker: Some(resolve_marker_with_source(start).0),
        snapshot_max_age_minutes: Some(resolve_snapshot_max_age_with_source(start).0.num_minutes()),
        default_user: resolve_default_user_with_source(start).0,
    }
}
