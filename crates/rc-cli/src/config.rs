//! Layered configuration for the `rc` binary.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use rc_core::{AttendanceRules, CourseOptions, MatchingRules, OrganizerInfo};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `SQLite` file holding stored exports and manual merges.
    pub database_path: PathBuf,

    /// Organizer to assume when the export's host columns are empty or wrong.
    #[serde(default)]
    pub organizer_name: Option<String>,
    #[serde(default)]
    pub organizer_email: Option<String>,

    /// Apply high-confidence alias merges automatically.
    pub auto_merge: bool,

    #[serde(default)]
    pub attendance: AttendanceRules,
    #[serde(default)]
    pub matching: MatchingRules,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("rc.db"),
            organizer_name: None,
            organizer_email: None,
            auto_merge: true,
            attendance: AttendanceRules::default(),
            matching: MatchingRules::default(),
        }
    }
}

impl Config {
    /// Builds the configuration, reading `config_path` on top of the usual files.
    ///
    /// Later sources win: defaults, the platform config file, `path`, then
    /// `RC_*` environment variables (`RC_ATTENDANCE__ABSENCE_TOLERANCE_MINUTES`
    /// for nested keys).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("RC_").split("__"));

        figment.extract()
    }

    /// Options for parsing a course under this configuration.
    pub fn course_options(&self) -> CourseOptions {
        CourseOptions {
            course_name: None,
            organizer: self.organizer_name.clone().map(|name| OrganizerInfo {
                name,
                email: self.organizer_email.clone(),
            }),
            auto_merge: self.auto_merge,
            attendance: self.attendance.clone(),
            matching: self.matching.clone(),
        }
    }
}

/// Returns the platform-specific config directory for rc.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rc"))
}

/// Returns the platform-specific data directory for rc.
///
/// On Linux: `~/.local/share/rc`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("rc"))
}
