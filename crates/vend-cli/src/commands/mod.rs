pub mod aliases;
pub mod build;
pub mod resolve;
pub mod version;

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use vend_core::alias::{AliasError, AliasRegistry};
use vend_core::vendor::{codes, VendorError};
use vend_core::{ResolveError, VendConfig, VEND_CONFIG_FILE};

/// Exit code for invalid input or configuration.
const EXIT_VALIDATION_ERROR: i32 = 2;

/// Exit code for everything else.
const EXIT_INTERNAL_ERROR: i32 = 1;

/// A command failure with a stable code.
#[derive(Debug)]
pub struct Failure {
    pub code: &'static str,
    pub message: String,
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self.code {
            codes::VEND_DEP_VERSION_CONFLICT
            | codes::VEND_CONFIG_INVALID
            | codes::VEND_VERSION_INVALID
            | codes::VEND_EXPORT_TARGET_INVALID
            | codes::VEND_MANIFEST_INVALID
            | "VEND_CONFIG_READ_FAILED"
            | "PROJECT_NOT_FOUND"
            | "SELF_REFERENCE_OVERFLOW" => EXIT_VALIDATION_ERROR,
            _ => EXIT_INTERNAL_ERROR,
        }
    }

    /// Print the failure and exit.
    ///
    /// With `json`, prints one object `{"ok": false, "error": {...}}` plus
    /// any `extra` fields to stdout.
    pub fn exit(&self, json: bool, extra: Map<String, Value>) -> ! {
        if json {
            let mut out = Map::new();
            out.insert("ok".to_string(), Value::Bool(false));
            out.insert(
                "error".to_string(),
                serde_json::json!({ "code": self.code, "message": self.message }),
            );
            out.extend(extra);
            println!("{:#}", Value::Object(out));
        } else {
            eprintln!("error: {}: {}", self.code, self.message);
        }
        std::process::exit(self.exit_code());
    }
}

impl From<VendorError> for Failure {
    fn from(e: VendorError) -> Self {
        Self {
            code: e.code(),
            message: e.message().to_string(),
        }
    }
}

impl From<vend_core::Error> for Failure {
    fn from(e: vend_core::Error) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl From<AliasError> for Failure {
    fn from(e: AliasError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl From<ResolveError> for Failure {
    fn from(e: ResolveError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

/// Host package root containing `cwd`.
fn project_root(cwd: &Path) -> Result<PathBuf, Failure> {
    vend_core::paths::project_root(cwd).ok_or_else(|| {
        vend_core::Error::ProjectNotFound {
            start: cwd.to_path_buf(),
        }
        .into()
    })
}

/// `vend.json` if present, defaults otherwise.
fn load_config_or_default(root: &Path) -> Result<VendConfig, Failure> {
    if root.join(VEND_CONFIG_FILE).is_file() {
        Ok(VendConfig::load(root)?)
    } else {
        Ok(VendConfig::default())
    }
}

/// Load the alias registry named by `config`.
///
/// A project that has never been built has no manifest; that is an empty
/// registry, not an error.
fn load_registry(root: &Path, config: &VendConfig) -> Result<(PathBuf, AliasRegistry), Failure> {
    let path = vend_core::paths::resolve_against(root, &config.alias_manifest);
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "no alias manifest; nothing is redirected");
        return Ok((path, AliasRegistry::default()));
    }
    let registry = AliasRegistry::load(&path)?;
    Ok((path, registry))
}
