//! Alias registry: which package identities are redirected, and where.
//!
//! The registry is loaded once from the alias manifest written by the
//! vendoring builder and is immutable afterwards. Entries loaded later for
//! the same identity replace earlier ones.

use crate::resolver::ExportMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Schema version of the on-disk alias manifest.
pub const ALIAS_SCHEMA_VERSION: u32 = 1;

/// Default alias manifest file name, relative to the host package root.
pub const DEFAULT_ALIAS_MANIFEST: &str = "vend-aliases.json";

/// Errors reading or writing alias manifests.
#[derive(Debug, Error)]
pub enum AliasError {
    #[error("failed to read alias manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse alias manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "alias manifest {} has schema version {found}, expected {}",
        path.display(),
        ALIAS_SCHEMA_VERSION
    )]
    UnsupportedSchema { path: PathBuf, found: u32 },

    #[error("failed to serialize alias manifest: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write alias manifest {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AliasError {
    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "ALIAS_MANIFEST_READ_FAILED",
            Self::Parse { .. } | Self::UnsupportedSchema { .. } => "ALIAS_MANIFEST_INVALID",
            Self::Serialize(_) | Self::Write { .. } => "ALIAS_MANIFEST_WRITE_FAILED",
        }
    }
}

/// How an entry redirects its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    /// Resolve through the export map, falling back to the vendored root.
    Exports,
    /// Plain path redirection to the vendored root.
    Path,
    /// Known identity deliberately left alone.
    PassThrough,
}

impl AliasKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exports => "exports",
            Self::Path => "path",
            Self::PassThrough => "pass_through",
        }
    }
}

/// How one package identity is redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub identity: String,
    /// Location of the vendored copy.
    pub vendored_root: Option<String>,
    /// Rewritten export map, if the source package declared one.
    pub export_map: Option<ExportMap>,
    /// Directory that relative roots and targets are anchored at.
    pub anchor: Option<PathBuf>,
}

impl AliasEntry {
    /// An identity redirected to a vendored directory.
    pub fn vendored(identity: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            vendored_root: Some(root.into()),
            export_map: None,
            anchor: None,
        }
    }

    /// An identity marked as "no redirection".
    pub fn pass_through(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            vendored_root: None,
            export_map: None,
            anchor: None,
        }
    }

    /// Attach an export map.
    #[must_use]
    pub fn with_exports(mut self, map: ExportMap) -> Self {
        self.export_map = Some(map);
        self
    }

    /// Set the directory relative paths are anchored at.
    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<PathBuf>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> AliasKind {
        match (&self.export_map, &self.vendored_root) {
            (Some(_), _) => AliasKind::Exports,
            (None, Some(_)) => AliasKind::Path,
            (None, None) => AliasKind::PassThrough,
        }
    }

    /// `vendored_root + subpath`, anchored. `None` without a vendored root.
    #[must_use]
    pub fn vendored_path(&self, subpath: &str) -> Option<String> {
        let root = self.vendored_root.as_deref()?;
        let joined = format!("{}{subpath}", root.trim_end_matches('/'));
        Some(self.anchored(&joined))
    }

    /// Anchor a relative specifier (`./`, `../`) at this entry's anchor.
    ///
    /// Bare and absolute specifiers are returned unchanged.
    #[must_use]
    pub fn anchored(&self, spec: &str) -> String {
        match &self.anchor {
            Some(anchor) if crate::specifier::is_relative(spec) => {
                let rel = spec.strip_prefix("./").unwrap_or(spec);
                anchor.join(rel).to_string_lossy().into_owned()
            }
            _ => spec.to_string(),
        }
    }

    fn to_record(&self) -> AliasRecord {
        AliasRecord {
            vendored_root: self.vendored_root.clone(),
            export_map: self.export_map.clone(),
        }
    }
}

/// One entry of the on-disk manifest; the identity is the map key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendored_root: Option<String>,
    #[serde(default, rename = "exports", skip_serializing_if = "Option::is_none")]
    pub export_map: Option<ExportMap>,
}

/// Serialized form of the alias registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasManifest {
    pub schema_version: u32,
    pub aliases: IndexMap<String, AliasRecord>,
}

impl Default for AliasManifest {
    fn default() -> Self {
        Self {
            schema_version: ALIAS_SCHEMA_VERSION,
            aliases: IndexMap::new(),
        }
    }
}

impl AliasManifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the record for `identity`.
    pub fn insert(&mut self, identity: impl Into<String>, record: AliasRecord) {
        self.aliases.insert(identity.into(), record);
    }

    /// Read and validate a manifest file.
    pub fn read(path: &Path) -> Result<Self, AliasError> {
        let content = std::fs::read_to_string(path).map_err(|source| AliasError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Self = serde_json::from_str(&content).map_err(|source| AliasError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if manifest.schema_version != ALIAS_SCHEMA_VERSION {
            return Err(AliasError::UnsupportedSchema {
                path: path.to_path_buf(),
                found: manifest.schema_version,
            });
        }
        Ok(manifest)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json_string(&self) -> Result<String, AliasError> {
        let mut text = serde_json::to_string_pretty(self).map_err(AliasError::Serialize)?;
        text.push('\n');
        Ok(text)
    }

    /// Atomically write the manifest to `path`.
    pub fn write(&self, path: &Path) -> Result<(), AliasError> {
        let text = self.to_json_string()?;
        vend_util::fs::atomic_write(path, text.as_bytes()).map_err(|source| AliasError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Immutable identity to alias table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasRegistry {
    entries: IndexMap<String, AliasEntry>,
}

impl AliasRegistry {
    #[must_use]
    pub fn builder() -> AliasRegistryBuilder {
        AliasRegistryBuilder::default()
    }

    /// Load a registry from a single manifest file.
    pub fn load(path: &Path) -> Result<Self, AliasError> {
        Ok(Self::builder().load_manifest(path)?.build())
    }

    /// Build a registry from an in-memory manifest.
    ///
    /// Relative roots and targets are joined onto `anchor`. With `None` they
    /// are kept as written and the native resolver takes them relative to
    /// the importing file, not the manifest. Pass the manifest's directory
    /// to get what [`AliasRegistry::load`] does.
    #[must_use]
    pub fn from_manifest(manifest: &AliasManifest, anchor: Option<&Path>) -> Self {
        Self::builder().with_manifest(manifest, anchor).build()
    }

    #[must_use]
    pub fn lookup(&self, identity: &str) -> Option<&AliasEntry> {
        self.entries.get(identity)
    }

    /// Entries in load order.
    pub fn iter(&self) -> impl Iterator<Item = &AliasEntry> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize back to a manifest. Anchors are not part of the manifest.
    #[must_use]
    pub fn to_manifest(&self) -> AliasManifest {
        let mut manifest = AliasManifest::new();
        for entry in self.entries.values() {
            manifest.insert(entry.identity.clone(), entry.to_record());
        }
        manifest
    }
}

/// Accumulates entries; the only way to construct an [`AliasRegistry`].
#[derive(Debug, Default)]
pub struct AliasRegistryBuilder {
    entries: IndexMap<String, AliasEntry>,
}

impl AliasRegistryBuilder {
    /// Add an entry, replacing any earlier entry for the same identity.
    #[must_use]
    pub fn insert(mut self, entry: AliasEntry) -> Self {
        if self.entries.contains_key(&entry.identity) {
            debug!(identity = %entry.identity, "alias entry replaced");
        }
        self.entries.insert(entry.identity.clone(), entry);
        self
    }

    /// Add every record of `manifest`, anchored at `anchor`.
    #[must_use]
    pub fn with_manifest(mut self, manifest: &AliasManifest, anchor: Option<&Path>) -> Self {
        for (identity, record) in &manifest.aliases {
            let entry = AliasEntry {
                identity: identity.clone(),
                vendored_root: record.vendored_root.clone(),
                export_map: record.export_map.clone(),
                anchor: anchor.map(Path::to_path_buf),
            };
            self = self.insert(entry);
        }
        self
    }

    /// Read a manifest file and add its records, anchored at its directory.
    pub fn load_manifest(self, path: &Path) -> Result<Self, AliasError> {
        let manifest = AliasManifest::read(path)?;
        let anchor = manifest_anchor(path);
        debug!(
            path = %path.display(),
            aliases = manifest.aliases.len(),
            "loaded alias manifest"
        );
        Ok(self.with_manifest(&manifest, Some(&anchor)))
    }

    #[must_use]
    pub fn build(self) -> AliasRegistry {
        AliasRegistry {
            entries: self.entries,
        }
    }
}

/// Directory containing the manifest, made absolute when possible.
fn manifest_anchor(path: &Path) -> PathBuf {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}
