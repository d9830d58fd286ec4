use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Default name of the organizer's own log file, kept inside FILES.
pub const DEFAULT_LOG_FILE_NAME: &str = "FileOrganizer_Log.txt";

/// Complete organizer configuration as persisted by the settings front end.
///
/// Every section has serde defaults, so a partial document is completed
/// from built-in values when loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizerConfig {
    #[serde(default)]
    pub resource_limits: ResourceLimits,

    #[serde(default)]
    pub base_dirs: BaseDirs,

    #[serde(default)]
    pub schedule: Schedule,

    #[serde(default)]
    pub debug_mode: bool,
}

/// System-wide utilization ceilings above which I/O-heavy work is deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default = "default_max_cpu_percent")]
    pub max_cpu_percent: u8,

    #[serde(default = "default_max_ram_percent")]
    pub max_ram_percent: u8,
}

/// The four managed locations.
///
/// `log` is a file path; the other three are directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDirs {
    pub old: Utf8PathBuf,
    pub trash: Utf8PathBuf,
    pub files: Utf8PathBuf,
    pub log: Utf8PathBuf,
}

/// Timing of the maintenance sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_archive_after_days")]
    pub archive_after_days: u64,

    /// Start a new archive once the current one reaches this size.
    /// `None` lets a single container grow without bound.
    #[serde(default)]
    pub max_archive_bytes: Option<u64>,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            resource_limits: ResourceLimits::default(),
            base_dirs: BaseDirs::default(),
            schedule: Schedule::default(),
            debug_mode: false,
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_cpu_percent: default_max_cpu_percent(),
            max_ram_percent: default_max_ram_percent(),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            archive_after_days: default_archive_after_days(),
            max_archive_bytes: None,
        }
    }
}

impl Default for BaseDirs {
    fn default() -> Self {
        Self::under(&default_desktop_dir())
    }
}

impl BaseDirs {
    /// Lay out the standard Old/Trash/Files tree under `root`,
    /// with the log file inside Files.
    pub fn under(root: &Utf8Path) -> Self {
        let files = root.join("Files");
        Self {
            old: root.join("Old"),
            trash: root.join("Trash"),
            log: files.join(DEFAULT_LOG_FILE_NAME),
            files,
        }
    }

    /// Name of the log file, used to keep the categorizer away from it.
    pub fn log_file_name(&self) -> &str {
        self.log.file_name().unwrap_or(DEFAULT_LOG_FILE_NAME)
    }

    /// Directories that must exist, in creation order. The log's parent
    /// stands in for the log entry itself.
    pub fn directories(&self) -> Vec<&Utf8Path> {
        let mut dirs = vec![self.old.as_path(), self.trash.as_path(), self.files.as_path()];
        if let Some(parent) = self.log.parent() {
            dirs.push(parent);
        }
        dirs
    }
}

impl OrganizerConfig {
    /// Check the structural invariants of a loaded or edited configuration.
    pub fn validate(&self) -> Result<(), String> {
        for (key, path) in [
            ("old", &self.base_dirs.old),
            ("trash", &self.base_dirs.trash),
            ("files", &self.base_dirs.files),
            ("log", &self.base_dirs.log),
        ] {
            if !path.is_absolute() {
                return Err(format!("base_dirs.{key} must be an absolute path: {path}"));
            }
        }

        if self.base_dirs.log.file_name().is_none() || self.base_dirs.log.parent().is_none() {
            return Err(format!(
                "base_dirs.log must name a file inside a directory: {}",
                self.base_dirs.log
            ));
        }

        if self.resource_limits.max_cpu_percent > 100 {
            return Err(format!(
                "resource_limits.max_cpu_percent out of range: {}",
                self.resource_limits.max_cpu_percent
            ));
        }
        if self.resource_limits.max_ram_percent > 100 {
            return Err(format!(
                "resource_limits.max_ram_percent out of range: {}",
                self.resource_limits.max_ram_percent
            ));
        }

        if self.schedule.sweep_interval_secs == 0 {
            return Err("schedule.sweep_interval_secs must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// The user's desktop, falling back to `<home>/Desktop` and finally the
/// working directory when no home is known.
pub fn default_desktop_dir() -> Utf8PathBuf {
    let candidate = dirs::desktop_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
        .or_else(|| std::env::current_dir().ok());

    candidate
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("/tmp"))
}

fn default_max_cpu_percent() -> u8 {
    50
}

fn default_max_ram_percent() -> u8 {
    70
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_archive_after_days() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_limit_defaults() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.max_cpu_percent, 50);
        assert_eq!(limits.max_ram_percent, 70);
    }

    #[test]
    fn test_base_dirs_layout() {
        let dirs = BaseDirs::under(Utf8Path::new("/home/user/Desktop"));
        assert_eq!(dirs.old, Utf8PathBuf::from("/home/user/Desktop/Old"));
        assert_eq!(dirs.trash, Utf8PathBuf::from("/home/user/Desktop/Trash"));
        assert_eq!(dirs.files, Utf8PathBuf::from("/home/user/Desktop/Files"));
        assert_eq!(
            dirs.log,
            Utf8PathBuf::from("/home/user/Desktop/Files/FileOrganizer_Log.txt")
        );
        assert_eq!(dirs.log_file_name(), DEFAULT_LOG_FILE_NAME);
    }

    #[test]
    fn test_directories_uses_log_parent() {
        let dirs = BaseDirs {
            old: "/a/Old".into(),
            trash: "/a/Trash".into(),
            files: "/a/Files".into(),
            log: "/var/log/organizer/organizer.txt".into(),
        };

        let list = dirs.directories();
        assert_eq!(list.len(), 4);
        assert_eq!(list[3], Utf8Path::new("/var/log/organizer"));
    }

    #[test]
    fn test_validate_rejects_relative_paths() {
        let mut config = OrganizerConfig::default();
        config.base_dirs = BaseDirs::under(Utf8Path::new("/srv/desk"));
        assert!(config.validate().is_ok());

        config.base_dirs.trash = Utf8PathBuf::from("Trash");
        let err = config.validate().unwrap_err();
        assert!(err.contains("base_dirs.trash"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_limits() {
        let mut config = OrganizerConfig::default();
        config.base_dirs = BaseDirs::under(Utf8Path::new("/srv/desk"));
        config.resource_limits.max_ram_percent = 150;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_completed_from_defaults() {
        let yaml = "resource_limits:\n  max_cpu_percent: 35\n";
        let config: OrganizerConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(config.resource_limits.max_cpu_percent, 35);
        assert_eq!(config.resource_limits.max_ram_percent, 70);
        assert_eq!(config.schedule.archive_after_days, 30);
        assert!(config.schedule.max_archive_bytes.is_none());
    }
}
