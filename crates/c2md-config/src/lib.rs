//! Configuration management for c2md.
//!
//! Parses `c2md.toml` configuration files with serde and provides
//! auto-discovery of the config file in the current directory and its parents.
//! Every setting has a default, so running without a config file is fine as
//! long as the command line supplies what the command needs (usually the
//! Confluence server URL).
//!
//! CLI settings are applied on top of the loaded file via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `${VAR}` and `${VAR:-default}` are expanded in:
//! - `confluence.server`
//! - `confluence.user`
//! - `confluence.password`
//! - `diagrams.kroki_url`
//! - `diagrams.plantuml_command`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "c2md.toml";

/// Default attachment folder.
const DEFAULT_ATTACHMENTS_DIR: &str = "attachments";

/// Default deepest header level rendered as a real header.
const DEFAULT_MAX_HEADER_DEPTH: u8 = 5;

/// Default DPI for rendered diagrams.
const DEFAULT_DPI: u32 = 192;

/// CLI settings that override configuration file values.
///
/// Only `Some` values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override Confluence server URL.
    pub server: Option<String>,
    /// Override credentials (`user:password`).
    pub credentials: Option<Credentials>,
    /// Override attachment folder.
    pub attachments_dir: Option<PathBuf>,
    /// Override cache flag.
    pub cache_enabled: Option<bool>,
    /// Override header hierarchy flag.
    pub hierarchy_headers: Option<bool>,
    /// Override title transformation flag.
    pub transform_titles: Option<bool>,
    /// Override root page title flag.
    pub root_page_title: Option<bool>,
    /// Override footnotes flag.
    pub footnotes: Option<bool>,
    /// Override maximum header depth.
    pub max_header_depth: Option<u8>,
    /// Override diagram rendering flag.
    pub diagrams_enabled: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Confluence connection settings.
    pub confluence: ConfluenceConfig,
    /// Output settings as parsed from TOML.
    output: OutputConfigRaw,
    /// Diagram settings as parsed from TOML.
    diagrams: DiagramsConfigRaw,

    /// Resolved output configuration (set after loading).
    #[serde(skip)]
    pub output_resolved: OutputConfig,
    /// Resolved diagram configuration (set after loading).
    #[serde(skip)]
    pub diagrams_resolved: DiagramsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confluence: ConfluenceConfig::default(),
            output: OutputConfigRaw::default(),
            diagrams: DiagramsConfigRaw::default(),
            output_resolved: OutputConfig::default(),
            diagrams_resolved: DiagramsConfig::default(),
            config_path: None,
        }
    }
}

/// Confluence connection settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    /// Server base URL, e.g. `https://wiki.example.com/wiki`.
    pub server: Option<String>,
    /// Basic-auth user name.
    pub user: Option<String>,
    /// Basic-auth password or API token.
    pub password: Option<String>,
}

impl ConfluenceConfig {
    /// Basic-auth credentials, if a user is configured.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.user.as_ref().map(|user| Credentials {
            user: user.clone(),
            password: self.password.clone().unwrap_or_default(),
        })
    }
}

/// HTTP basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub user: String,
    /// Password or API token.
    pub password: String,
}

impl Credentials {
    /// Parse `user:password`. The password may itself contain `:`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if there is no `:` or the user is empty.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let (user, password) = value.split_once(':').ok_or_else(|| {
            ConfigError::Validation("credentials must have the form user:password".to_owned())
        })?;
        require_non_empty(user, "credentials user")?;
        Ok(Self {
            user: user.to_owned(),
            password: password.to_owned(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Raw output configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OutputConfigRaw {
    attachments_dir: Option<String>,
    cache_enabled: Option<bool>,
    hierarchy_headers: Option<bool>,
    transform_titles: Option<bool>,
    root_page_title: Option<bool>,
    footnotes: Option<bool>,
    max_header_depth: Option<u8>,
}

/// Resolved output configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Attachment folder, relative to the working directory unless absolute.
    pub attachments_dir: PathBuf,
    /// Whether the attachment cache manifest is persisted between runs.
    pub cache_enabled: bool,
    /// Derive page header levels from the page hierarchy.
    pub hierarchy_headers: bool,
    /// Cut page titles at the first `-`.
    pub transform_titles: bool,
    /// Emit a header for the root page.
    pub root_page_title: bool,
    /// Render external links as footnotes.
    pub footnotes: bool,
    /// Deepest header level rendered as a header; deeper ones become bold text.
    pub max_header_depth: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            attachments_dir: PathBuf::from(DEFAULT_ATTACHMENTS_DIR),
            cache_enabled: false,
            hierarchy_headers: true,
            transform_titles: true,
            root_page_title: true,
            footnotes: true,
            max_header_depth: DEFAULT_MAX_HEADER_DEPTH,
        }
    }
}

/// Diagram renderer backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Local `PlantUML` executable.
    #[default]
    PlantUml,
    /// Kroki HTTP service.
    Kroki,
}

/// Raw diagram configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DiagramsConfigRaw {
    enabled: Option<bool>,
    renderer: Option<RendererKind>,
    plantuml_command: Option<String>,
    kroki_url: Option<String>,
    include_dirs: Option<Vec<String>>,
    dpi: Option<u32>,
}

/// Resolved diagram configuration with absolute include paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramsConfig {
    /// Whether diagrams are rendered at all.
    pub enabled: bool,
    /// Renderer backend.
    pub renderer: RendererKind,
    /// `PlantUML` command line (program followed by arguments).
    pub plantuml_command: String,
    /// Kroki server URL.
    pub kroki_url: Option<String>,
    /// Directories to search for `PlantUML` `!include` directives.
    pub include_dirs: Vec<PathBuf>,
    /// DPI for diagram rendering.
    pub dpi: u32,
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            renderer: RendererKind::PlantUml,
            plantuml_command: "plantuml".to_owned(),
            kroki_url: None,
            include_dirs: Vec::new(),
            dpi: DEFAULT_DPI,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`confluence.password`").
        field: String,
        /// Error message (e.g., "${`CONFLUENCE_PASSWORD`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `c2md.toml` in the current directory and its parents, falling back
    /// to defaults. CLI settings win over file values and the merged result
    /// is validated.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(server) = &settings.server {
            self.confluence.server = Some(server.clone());
        }
        if let Some(credentials) = &settings.credentials {
            self.confluence.user = Some(credentials.user.clone());
            self.confluence.password = Some(credentials.password.clone());
        }

        let output = &mut self.output_resolved;
        if let Some(dir) = &settings.attachments_dir {
            output.attachments_dir.clone_from(dir);
        }
        if let Some(v) = settings.cache_enabled {
            output.cache_enabled = v;
        }
        if let Some(v) = settings.hierarchy_headers {
            output.hierarchy_headers = v;
        }
        if let Some(v) = settings.transform_titles {
            output.transform_titles = v;
        }
        if let Some(v) = settings.root_page_title {
            output.root_page_title = v;
        }
        if let Some(v) = settings.footnotes {
            output.footnotes = v;
        }
        if let Some(v) = settings.max_header_depth {
            output.max_header_depth = v;
        }
        if let Some(v) = settings.diagrams_enabled {
            self.diagrams_resolved.enabled = v;
        }
    }

    /// Get the validated Confluence server URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if no server is configured.
    pub fn require_server(&self) -> Result<&str, ConfigError> {
        let server = self.confluence.server.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "Confluence server required (via --server or [confluence] server)".to_owned(),
            )
        })?;
        require_non_empty(server, "confluence.server")?;
        require_http_url(server, "confluence.server")?;
        Ok(server)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_confluence()?;
        self.validate_output()?;
        self.validate_diagrams()?;
        Ok(())
    }

    /// A configured server must be an http(s) URL. Absence is checked by
    /// [`Config::require_server`] for commands that need one.
    fn validate_confluence(&self) -> Result<(), ConfigError> {
        if let Some(server) = &self.confluence.server {
            require_non_empty(server, "confluence.server")?;
            require_http_url(server, "confluence.server")?;
        }
        if let Some(user) = &self.confluence.user {
            require_non_empty(user, "confluence.user")?;
        }
        Ok(())
    }

    fn validate_output(&self) -> Result<(), ConfigError> {
        if self.output_resolved.max_header_depth == 0 {
            return Err(ConfigError::Validation(
                "output.max_header_depth must be at least 1".to_owned(),
            ));
        }
        if self.output_resolved.attachments_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output.attachments_dir cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_diagrams(&self) -> Result<(), ConfigError> {
        const MAX_DPI: u32 = 1000;

        let diagrams = &self.diagrams_resolved;
        if !diagrams.enabled {
            return Ok(());
        }

        match diagrams.renderer {
            RendererKind::Kroki => {
                let url = diagrams.kroki_url.as_deref().ok_or_else(|| {
                    ConfigError::Validation(
                        "diagrams.renderer = \"kroki\" requires kroki_url to be set".to_owned(),
                    )
                })?;
                require_non_empty(url, "diagrams.kroki_url")?;
                require_http_url(url, "diagrams.kroki_url")?;
            }
            RendererKind::PlantUml => {
                require_non_empty(diagrams.plantuml_command.trim(), "diagrams.plantuml_command")?;
            }
        }

        if diagrams.dpi == 0 {
            return Err(ConfigError::Validation(
                "diagrams.dpi must be greater than 0".to_owned(),
            ));
        }
        if diagrams.dpi > MAX_DPI {
            return Err(ConfigError::Validation(format!(
                "diagrams.dpi cannot exceed {MAX_DPI}"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        expand::expand_opt(&mut self.confluence.server, "confluence.server")?;
        expand::expand_opt(&mut self.confluence.user, "confluence.user")?;
        expand::expand_opt(&mut self.confluence.password, "confluence.password")?;
        expand::expand_opt(&mut self.diagrams.kroki_url, "diagrams.kroki_url")?;
        expand::expand_opt(
            &mut self.diagrams.plantuml_command,
            "diagrams.plantuml_command",
        )?;
        Ok(())
    }

    /// Merge raw TOML values over defaults. Include directories are resolved
    /// against the config file's directory.
    fn resolve(&mut self, config_dir: &Path) {
        let raw = &self.output;
        let defaults = OutputConfig::default();
        self.output_resolved = OutputConfig {
            attachments_dir: raw
                .attachments_dir
                .as_deref()
                .map_or(defaults.attachments_dir, PathBuf::from),
            cache_enabled: raw.cache_enabled.unwrap_or(defaults.cache_enabled),
            hierarchy_headers: raw.hierarchy_headers.unwrap_or(defaults.hierarchy_headers),
            transform_titles: raw.transform_titles.unwrap_or(defaults.transform_titles),
            root_page_title: raw.root_page_title.unwrap_or(defaults.root_page_title),
            footnotes: raw.footnotes.unwrap_or(defaults.footnotes),
            max_header_depth: raw.max_header_depth.unwrap_or(defaults.max_header_depth),
        };

        let raw = &self.diagrams;
        let defaults = DiagramsConfig::default();
        self.diagrams_resolved = DiagramsConfig {
            enabled: raw.enabled.unwrap_or(defaults.enabled),
            renderer: raw.renderer.unwrap_or(defaults.renderer),
            plantuml_command: raw
                .plantuml_command
                .clone()
                .unwrap_or(defaults.plantuml_command),
            kroki_url: raw.kroki_url.clone(),
            include_dirs: raw
                .include_dirs
                .iter()
                .flatten()
                .map(|d| config_dir.join(d))
                .collect(),
            dpi: raw.dpi.unwrap_or(defaults.dpi),
        };
    }
}
