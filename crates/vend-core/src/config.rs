use crate::alias::DEFAULT_ALIAS_MANIFEST;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Build configuration file name, looked up at the host package root.
pub const VEND_CONFIG_FILE: &str = "vend.json";

/// Runtime configuration for the vend CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Literal text substitution applied to vendored sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRewrite {
    pub find: String,
    pub replace: String,
}

impl Default for MarkerRewrite {
    fn default() -> Self {
        Self {
            find: "makeLog(\"".to_string(),
            replace: "makeLog(\"[VENDORED] ".to_string(),
        }
    }
}

/// Contents of `vend.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct VendConfig {
    /// Package identities to vendor, in build order.
    pub packages: Vec<String>,

    /// Identities registered with no redirection.
    pub pass_through: Vec<String>,

    /// Directory holding the source packages, relative to the host root.
    pub source_root: PathBuf,

    /// Vendored tree location, relative to the host root.
    pub vendored_dir: PathBuf,

    /// Alias manifest location, relative to the host root.
    pub alias_manifest: PathBuf,

    /// Synchronized version. Defaults to the host package's own version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Dependencies with this prefix are pinned to the synchronized version.
    pub internal_scope: String,

    /// Diagnostic marker rewrite; `null` disables it.
    pub marker: Option<MarkerRewrite>,

    /// File name globs for the top-level files the marker rewrite touches.
    pub source_globs: Vec<String>,

    /// Rename vendored copies to `<scope>-<name>-vendored`.
    pub rename_vendored: bool,
}

impl Default for VendConfig {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            pass_through: Vec::new(),
            source_root: PathBuf::from(".."),
            vendored_dir: PathBuf::from("vendored"),
            alias_manifest: PathBuf::from(DEFAULT_ALIAS_MANIFEST),
            version: None,
            internal_scope: "@my/".to_string(),
            marker: Some(MarkerRewrite::default()),
            source_globs: vec!["*.js".to_string()],
            rename_vendored: false,
        }
    }
}

impl VendConfig {
    /// Read `vend.json` from `root`.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(VEND_CONFIG_FILE);
        let content = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse { path, source })
    }

    /// Set the packages to vendor.
    #[must_use]
    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pass-through identities.
    #[must_use]
    pub fn with_pass_through<I, S>(mut self, identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pass_through = identities.into_iter().map(Into::into).collect();
        self
    }

    /// Set the source package directory.
    #[must_use]
    pub fn with_source_root(mut self, source_root: impl Into<PathBuf>) -> Self {
        self.source_root = source_root.into();
        self
    }

    /// Set the synchronized version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set or disable the marker rewrite.
    #[must_use]
    pub fn with_marker(mut self, marker: Option<MarkerRewrite>) -> Self {
        self.marker = marker;
        self
    }

    /// Enable renaming of vendored copies.
    #[must_use]
    pub fn with_rename_vendored(mut self, rename: bool) -> Self {
        self.rename_vendored = rename;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: VendConfig =
            serde_json::from_str(r#"{"packages": ["@my/package-a"], "version": "1.2.3"}"#).unwrap();
        assert_eq!(config.packages, vec!["@my/package-a"]);
        assert_eq!(config.version.as_deref(), Some("1.2.3"));
        assert_eq!(config.source_root, PathBuf::from(".."));
        assert_eq!(config.vendored_dir, PathBuf::from("vendored"));
        assert_eq!(config.alias_manifest, PathBuf::from("vend-aliases.json"));
        assert_eq!(config.internal_scope, "@my/");
        assert_eq!(config.marker, Some(MarkerRewrite::default()));
        assert_eq!(config.source_globs, vec!["*.js"]);
        assert!(!config.rename_vendored);
    }

    #[test]
    fn test_marker_can_be_disabled() {
        let config: VendConfig = serde_json::from_str(r#"{"marker": null}"#).unwrap();
        assert_eq!(config.marker, None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_str::<VendConfig>(r#"{"pakages": []}"#).is_err());
    }

    #[test]
    fn test_load_errors_carry_path() {
        let dir = tempdir().unwrap();
        let err = VendConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));

        std::fs::write(dir.path().join(VEND_CONFIG_FILE), "{not json").unwrap();
        let err = VendConfig::load(dir.path()).unwrap_err();
        match err {
            Error::ConfigParse { path, .. } => assert!(path.ends_with(VEND_CONFIG_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_camel_case() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(VEND_CONFIG_FILE),
            r#"{"packages": ["@my/package-b"], "passThrough": ["@my/log"], "renameVendored": true}"#,
        )
        .unwrap();
        let config = VendConfig::load(dir.path()).unwrap();
        assert_eq!(config.pass_through, vec!["@my/log"]);
        assert!(config.rename_vendored);
    }

    #[test]
    fn test_runtime_config_builder() {
        let config = Config::new(PathBuf::from("/tmp"))
            .with_verbosity(2)
            .with_json_logs(true);
        assert_eq!(config.cwd, PathBuf::from("/tmp"));
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
    }
}
