//! Configuration management
//!
//! A run is described by one YAML file. [`Config::load`] parses it,
//! [`Config::validate`] rejects unusable settings before any builder starts,
//! and [`Config::export_settings`] writes the JSON snapshot kept next to the
//! results (passwords are never serialized).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::{ContainerRuntime, SessionTarget, SshAuth};
use crate::model::{EditorPlatform, EngineVersion, GamePlatform, HostKind};
use crate::paths::{DEFAULT_MAC_ENGINE_BASE, DEFAULT_WINDOWS_ENGINE_BASE};

/// Image used for Linux container builds; `{version}` is replaced per run
pub const DEFAULT_CONTAINER_IMAGE: &str = "ghcr.io/epicgames/unreal-engine:dev-slim-{version}";

/// Errors loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("Cannot access '{path}': {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The YAML is not a valid configuration
    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The settings snapshot could not be serialized
    #[error("Cannot serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A required value is missing or empty
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// The engine version list names a version twice
    #[error("Engine version {0} is listed more than once")]
    DuplicateVersion(EngineVersion),

    /// The editor platform list names a platform twice
    #[error("Editor platform {0} is listed more than once")]
    DuplicatePlatform(EditorPlatform),

    /// Repository source is ambiguous or absent
    #[error("Repository needs exactly one of 'url' or 'local_path'")]
    RepositorySource,

    /// A platform is selected but has no connection settings
    #[error("{platform} is selected but '{section}' is not configured")]
    MissingHostSettings {
        /// Selected platform
        platform: EditorPlatform,
        /// Section that must be present
        section: &'static str,
    },

    /// A value is present but unusable
    #[error("Invalid value for '{field}': {reason}")]
    Invalid {
        /// Offending setting
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

fn default_temp_path() -> PathBuf {
    std::env::temp_dir().join("unreal-ci")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_work_root() -> String {
    "/tmp/unreal-ci".to_string()
}

fn default_windows_engine_base() -> String {
    DEFAULT_WINDOWS_ENGINE_BASE.to_string()
}

fn default_container_image() -> String {
    DEFAULT_CONTAINER_IMAGE.to_string()
}

/// Where the sources come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositorySettings {
    /// Remote to clone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Branch to clone
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Existing local checkout, used instead of cloning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

/// The project being built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Project name, also the `.uproject` stem
    pub name: String,
    /// Plugin name; selects the plugin flow when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    /// Automation test filter; defaults to the plugin or project name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_filter: Option<String>,
    /// Source repository
    pub repository: RepositorySettings,
}

/// Phase toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSettings {
    /// Run automation tests after a successful build
    #[serde(default = "default_true")]
    pub test: bool,
    /// Package after a successful build
    #[serde(default = "default_true")]
    pub package: bool,
    /// Merge per-platform plugin packages into one release tree
    #[serde(default = "default_true")]
    pub merge_packages: bool,
    /// Zip the merged release tree
    #[serde(default)]
    pub zip_release: bool,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            test: true,
            package: true,
            merge_packages: true,
            zip_release: false,
        }
    }
}

/// SSH connection to a build host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Host name or address
    pub host: String,
    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Login user
    pub user: String,
    /// Login password; never written back out
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Private key file, preferred over a password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl SshSettings {
    /// Session target for these settings
    #[must_use]
    pub fn to_target(&self) -> SessionTarget {
        let auth = match (&self.private_key, &self.password) {
            (Some(key), _) => SshAuth::PrivateKey(key.clone()),
            (None, Some(password)) => SshAuth::Password(password.clone()),
            (None, None) => SshAuth::Agent,
        };
        SessionTarget {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            auth,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

/// A build host reached over SSH
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteHostSettings {
    /// Connection settings
    pub connection: SshSettings,
    /// Directory holding the `UE_<version>` installations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_base: Option<String>,
    /// Remote directory for working copies and results
    #[serde(default = "default_work_root")]
    pub work_root: String,
}

/// Local Windows host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsSettings {
    /// Directory holding the `UE_<version>` installations
    #[serde(default = "default_windows_engine_base")]
    pub engine_base: String,
    /// Per-version directory that successful packages are copied to
    #[serde(default)]
    pub destinations: BTreeMap<EngineVersion, String>,
}

impl Default for WindowsSettings {
    fn default() -> Self {
        Self {
            engine_base: default_windows_engine_base(),
            destinations: BTreeMap::new(),
        }
    }
}

/// Remote Mac host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacSettings {
    /// Host settings; the engine base defaults to the shared install location
    #[serde(flatten)]
    pub host: RemoteHostSettings,
    /// Per-version remote directory that successful packages are copied to
    #[serde(default)]
    pub destinations: BTreeMap<EngineVersion, String>,
}

impl MacSettings {
    /// Engine base directory on the Mac
    #[must_use]
    pub fn engine_base(&self) -> &str {
        self.host.engine_base.as_deref().unwrap_or(DEFAULT_MAC_ENGINE_BASE)
    }
}

/// How Linux builds run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxMode {
    /// One-shot container per phase
    #[default]
    Container,
    /// Remote host over SSH
    Remote,
}

/// Container settings for Linux builds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSettings {
    /// Container runtime
    #[serde(default)]
    pub runtime: ContainerRuntime,
    /// Image reference; `{version}` expands to the engine version
    #[serde(default = "default_container_image")]
    pub image: String,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            runtime: ContainerRuntime::default(),
            image: default_container_image(),
        }
    }
}

impl ContainerSettings {
    /// Image for one engine version
    #[must_use]
    pub fn image_for(&self, version: EngineVersion) -> String {
        self.image.replace("{version}", version.as_str())
    }
}

/// Linux host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinuxSettings {
    /// Container or remote builds
    #[serde(default)]
    pub mode: LinuxMode,
    /// Used in container mode
    #[serde(default)]
    pub container: ContainerSettings,
    /// Used in remote mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteHostSettings>,
    /// Per-version directory that successful packages are copied to
    #[serde(default)]
    pub destinations: BTreeMap<EngineVersion, String>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project under test
    pub project: ProjectSettings,
    /// Engine versions to build, in order
    pub engine_versions: Vec<EngineVersion>,
    /// Hosts to build on
    pub editor_platforms: Vec<EditorPlatform>,
    /// Targets to package for
    #[serde(default)]
    pub game_platforms: Vec<GamePlatform>,
    /// Local result root
    pub result_path: PathBuf,
    /// Local root for clones and working copies
    #[serde(default = "default_temp_path")]
    pub temp_path: PathBuf,
    /// Phase toggles
    #[serde(default)]
    pub phases: PhaseSettings,
    /// Environment overlay for every toolchain invocation
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Windows host
    #[serde(default)]
    pub windows: WindowsSettings,
    /// Mac host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<MacSettings>,
    /// Linux host
    #[serde(default)]
    pub linux: LinuxSettings,
    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Loads configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parses configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Checks the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.name.trim().is_empty() {
            return Err(ConfigError::Missing("project.name"));
        }
        if self
            .project
            .plugin_name
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "project.plugin_name",
                reason: "must not be empty".to_string(),
            });
        }

        let repo = &self.project.repository;
        match (&repo.url, &repo.local_path) {
            (Some(url), None) if !url.trim().is_empty() => {
                if repo.branch.trim().is_empty() {
                    return Err(ConfigError::Missing("project.repository.branch"));
                }
            }
            (None, Some(_)) => {}
            _ => return Err(ConfigError::RepositorySource),
        }

        if self.engine_versions.is_empty() {
            return Err(ConfigError::Missing("engine_versions"));
        }
        for (i, version) in self.engine_versions.iter().enumerate() {
            if self.engine_versions[..i].contains(version) {
                return Err(ConfigError::DuplicateVersion(*version));
            }
        }

        if self.editor_platforms.is_empty() {
            return Err(ConfigError::Missing("editor_platforms"));
        }
        for (i, platform) in self.editor_platforms.iter().enumerate() {
            if self.editor_platforms[..i].contains(platform) {
                return Err(ConfigError::DuplicatePlatform(*platform));
            }
        }

        if self.result_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("result_path"));
        }

        if self.editor_platforms.contains(&EditorPlatform::Mac) {
            let mac = self.mac.as_ref().ok_or(ConfigError::MissingHostSettings {
                platform: EditorPlatform::Mac,
                section: "mac",
            })?;
            validate_connection(&mac.host.connection, "mac.connection")?;
        }

        if self.editor_platforms.contains(&EditorPlatform::Linux) {
            match self.linux.mode {
                LinuxMode::Container => {
                    if self.linux.container.image.trim().is_empty() {
                        return Err(ConfigError::Missing("linux.container.image"));
                    }
                }
                LinuxMode::Remote => {
                    let remote =
                        self.linux
                            .remote
                            .as_ref()
                            .ok_or(ConfigError::MissingHostSettings {
                                platform: EditorPlatform::Linux,
                                section: "linux.remote",
                            })?;
                    validate_connection(&remote.connection, "linux.remote.connection")?;
                    if remote.engine_base.as_deref().is_none_or(|b| b.trim().is_empty()) {
                        return Err(ConfigError::Missing("linux.remote.engine_base"));
                    }
                }
            }
        }

        Ok(())
    }

    /// True when a plugin is built, packaged and merged
    #[must_use]
    pub fn is_plugin_flow(&self) -> bool {
        self.project.plugin_name.is_some()
    }

    /// Automation test filter
    #[must_use]
    pub fn test_filter(&self) -> &str {
        self.project
            .test_filter
            .as_deref()
            .or(self.project.plugin_name.as_deref())
            .unwrap_or(&self.project.name)
    }

    /// Builder variant used for `platform`
    #[must_use]
    pub fn host_kind(&self, platform: EditorPlatform) -> HostKind {
        match platform {
            EditorPlatform::Windows => HostKind::Windows,
            EditorPlatform::Mac => HostKind::Mac,
            EditorPlatform::Linux => match self.linux.mode {
                LinuxMode::Container => HostKind::LinuxContainer,
                LinuxMode::Remote => HostKind::LinuxRemote,
            },
        }
    }

    /// Package delivery directory for one platform and version, if configured
    #[must_use]
    pub fn destination(&self, platform: EditorPlatform, version: EngineVersion) -> Option<&str> {
        let map = match platform {
            EditorPlatform::Windows => &self.windows.destinations,
            EditorPlatform::Mac => &self.mac.as_ref()?.destinations,
            EditorPlatform::Linux => &self.linux.destinations,
        };
        map.get(&version).map(String::as_str)
    }

    /// Settings snapshot as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn settings_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the settings snapshot to `path`, creating its parent
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn export_settings(&self, path: &Path) -> Result<(), ConfigError> {
        let json = self.settings_json()?;
        let io_error = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, json).map_err(io_error)
    }
}

fn validate_connection(settings: &SshSettings, field: &'static str) -> Result<(), ConfigError> {
    if settings.host.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "host must not be empty".to_string(),
        });
    }
    if settings.user.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "user must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
project:
  name: Sample
  plugin_name: Widget
  repository:
    url: https://example.com/sample.git
engine_versions: ["5.3", "UE_5_4"]
editor_platforms: [Windows, Linux]
game_platforms: [Win64, Linux]
result_path: /tmp/results
"#;

    fn minimal() -> Config {
        Config::from_yaml(MINIMAL).unwrap()
    }

    fn with_mac(config: &mut Config, password: Option<&str>) {
        config.editor_platforms.push(EditorPlatform::Mac);
        config.mac = Some(MacSettings {
            host: RemoteHostSettings {
                connection: SshSettings {
                    host: "mac-mini".to_string(),
                    port: 22,
                    user: "builder".to_string(),
                    password: password.map(str::to_string),
                    private_key: None,
                    connect_timeout_secs: 15,
                },
                engine_base: None,
                work_root: default_work_root(),
            },
            destinations: BTreeMap::new(),
        });
    }

    #[test]
    fn test_load_defaults() {
        let config = minimal();
        assert_eq!(
            config.engine_versions,
            vec![EngineVersion::Ue5_3, EngineVersion::Ue5_4]
        );
        assert_eq!(config.project.repository.branch, "main");
        assert_eq!(config.phases, PhaseSettings::default());
        assert_eq!(config.windows.engine_base, DEFAULT_WINDOWS_ENGINE_BASE);
        assert_eq!(config.linux.mode, LinuxMode::Container);
        assert_eq!(config.log_level, "info");
        assert!(config.is_plugin_flow());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/does/not/exist.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unknown_version_is_parse_error() {
        let text = MINIMAL.replace("\"UE_5_4\"", "\"4.27\"");
        assert!(matches!(Config::from_yaml(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_empty_matrix() {
        let mut config = minimal();
        config.engine_versions.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("engine_versions"))
        ));

        let mut config = minimal();
        config.editor_platforms.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("editor_platforms"))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = minimal();
        config.engine_versions.push(EngineVersion::Ue5_3);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateVersion(EngineVersion::Ue5_3))
        ));
    }

    #[test]
    fn test_validate_repository_source() {
        let mut config = minimal();
        config.project.repository.local_path = Some(PathBuf::from("/src"));
        assert!(matches!(config.validate(), Err(ConfigError::RepositorySource)));

        config.project.repository.url = None;
        assert!(config.validate().is_ok());

        config.project.repository.local_path = None;
        assert!(matches!(config.validate(), Err(ConfigError::RepositorySource)));
    }

    #[test]
    fn test_validate_requires_mac_settings() {
        let mut config = minimal();
        config.editor_platforms.push(EditorPlatform::Mac);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingHostSettings {
                platform: EditorPlatform::Mac,
                ..
            })
        ));

        let mut config = minimal();
        with_mac(&mut config, Some("secret"));
        assert!(config.validate().is_ok());
        config.mac.as_mut().unwrap().host.connection.user.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_validate_linux_remote_needs_engine_base() {
        let mut config = minimal();
        config.linux.mode = LinuxMode::Remote;
        assert!(config.validate().is_err());

        config.linux.remote = Some(RemoteHostSettings {
            connection: SshSettings {
                host: "linux-box".to_string(),
                port: 2222,
                user: "ci".to_string(),
                password: None,
                private_key: Some(PathBuf::from("/keys/id_ed25519")),
                connect_timeout_secs: 5,
            },
            engine_base: None,
            work_root: default_work_root(),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("linux.remote.engine_base"))
        ));

        config.linux.remote.as_mut().unwrap().engine_base = Some("/opt/epic".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.host_kind(EditorPlatform::Linux), HostKind::LinuxRemote);
    }

    #[test]
    fn test_settings_snapshot_omits_password() {
        let mut config = minimal();
        with_mac(&mut config, Some("hunter2"));
        let json = config.settings_json().unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));
        assert!(json.contains("mac-mini"));
    }

    #[test]
    fn test_export_settings_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/settings.json");
        minimal().export_settings(&path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["project"]["name"], "Sample");
        assert_eq!(written["engine_versions"][1], "5.4");
    }

    #[test]
    fn test_ssh_auth_selection() {
        let mut settings = SshSettings {
            host: "h".to_string(),
            port: 22,
            user: "u".to_string(),
            password: Some("p".to_string()),
            private_key: None,
            connect_timeout_secs: 3,
        };
        assert_eq!(settings.to_target().auth, SshAuth::Password("p".to_string()));
        settings.private_key = Some(PathBuf::from("/k"));
        assert_eq!(settings.to_target().auth, SshAuth::PrivateKey(PathBuf::from("/k")));
        settings.password = None;
        settings.private_key = None;
        assert_eq!(settings.to_target().auth, SshAuth::Agent);
        assert_eq!(settings.to_target().connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_test_filter_fallbacks() {
        let mut config = minimal();
        assert_eq!(config.test_filter(), "Widget");
        config.project.plugin_name = None;
        assert_eq!(config.test_filter(), "Sample");
        config.project.test_filter = Some("Project.Smoke".to_string());
        assert_eq!(config.test_filter(), "Project.Smoke");
    }

    #[test]
    fn test_container_image_expansion() {
        let settings = ContainerSettings::default();
        assert_eq!(
            settings.image_for(EngineVersion::Ue5_3),
            "ghcr.io/epicgames/unreal-engine:dev-slim-5.3"
        );
    }

    #[test]
    fn test_destination_lookup() {
        let mut config = minimal();
        config
            .windows
            .destinations
            .insert(EngineVersion::Ue5_3, r"D:\Plugins\5.3".to_string());
        assert_eq!(
            config.destination(EditorPlatform::Windows, EngineVersion::Ue5_3),
            Some(r"D:\Plugins\5.3")
        );
        assert_eq!(config.destination(EditorPlatform::Windows, EngineVersion::Ue5_4), None);
        assert_eq!(config.destination(EditorPlatform::Mac, EngineVersion::Ue5_3), None);
    }
}
