//! Filesystem module resolution.
//!
//! This is the final step every intercepted request is delegated to. It
//! supports:
//! - Relative specifiers: `./`, `../` (against the importer's directory)
//! - Absolute filesystem specifiers
//! - Bare specifiers with `node_modules` lookup
//! - Extension probing
//! - Directory resolution (`package.json` exports, main, `index.*`)

use super::exports::ExportMap;
use crate::specifier;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default extensions for probing.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".cjs", ".mjs", ".json"];

/// Maximum number of tried paths to record.
const MAX_TRIED_PATHS: usize = 20;

/// Per-request context handed to every resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Directory containing the importing file.
    pub parent: PathBuf,
    /// Active export conditions, highest priority first.
    pub conditions: Vec<String>,
}

impl RequestContext {
    /// Create a context with no active conditions.
    pub fn new(parent: impl Into<PathBuf>) -> Self {
        Self {
            parent: parent.into(),
            conditions: Vec::new(),
        }
    }

    /// Set the active conditions.
    #[must_use]
    pub fn with_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions = conditions.into_iter().map(Into::into).collect();
        self
    }
}

/// The host loader's own resolution step.
///
/// Implementations must be safe to call concurrently.
pub trait NativeResolver: Send + Sync {
    /// Resolve `specifier` to a concrete path.
    fn resolve(&self, specifier: &str, ctx: &RequestContext) -> Result<PathBuf, NativeError>;
}

impl<T: NativeResolver + ?Sized> NativeResolver for &T {
    fn resolve(&self, specifier: &str, ctx: &RequestContext) -> Result<PathBuf, NativeError> {
        (**self).resolve(specifier, ctx)
    }
}

impl<T: NativeResolver + ?Sized> NativeResolver for Box<T> {
    fn resolve(&self, specifier: &str, ctx: &RequestContext) -> Result<PathBuf, NativeError> {
        (**self).resolve(specifier, ctx)
    }
}

/// Reason codes for failed native resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeReasonCode {
    SpecifierInvalid,
    UnsupportedScheme,
    NotFound,
    IsDirectory,
    NodeModulesNotFound,
    PackageJsonInvalid,
    ExportsNotFound,
    ExportsTargetNotFound,
}

impl NativeReasonCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpecifierInvalid => "SPECIFIER_INVALID",
            Self::UnsupportedScheme => "UNSUPPORTED_SCHEME",
            Self::NotFound => "NOT_FOUND",
            Self::IsDirectory => "IS_DIRECTORY",
            Self::NodeModulesNotFound => "NODE_MODULES_NOT_FOUND",
            Self::PackageJsonInvalid => "PACKAGE_JSON_INVALID",
            Self::ExportsNotFound => "EXPORTS_NOT_FOUND",
            Self::ExportsTargetNotFound => "EXPORTS_TARGET_NOT_FOUND",
        }
    }
}

impl std::fmt::Display for NativeReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed native resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot resolve '{specifier}': {code}")]
pub struct NativeError {
    pub specifier: String,
    pub code: NativeReasonCode,
    /// Candidate paths tried (capped).
    pub tried: Vec<PathBuf>,
}

impl NativeError {
    #[must_use]
    pub fn new(specifier: impl Into<String>, code: NativeReasonCode) -> Self {
        Self {
            specifier: specifier.into(),
            code,
            tried: Vec::new(),
        }
    }
}

/// Resolver over the real filesystem.
#[derive(Debug, Clone)]
pub struct FsResolver {
    /// Extensions to probe (in order).
    extensions: &'static [&'static str],
}

impl Default for FsResolver {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS,
        }
    }
}

impl FsResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the probed extensions.
    #[must_use]
    pub fn with_extensions(mut self, extensions: &'static [&'static str]) -> Self {
        self.extensions = extensions;
        self
    }
}

impl NativeResolver for FsResolver {
    fn resolve(&self, spec: &str, ctx: &RequestContext) -> Result<PathBuf, NativeError> {
        let mut probe = Probe {
            resolver: self,
            ctx,
            tried: Vec::new(),
        };

        let outcome = if spec.is_empty() {
            Err(NativeReasonCode::SpecifierInvalid)
        } else if spec.contains("://") || spec.starts_with("node:") || spec.starts_with("data:") {
            Err(NativeReasonCode::UnsupportedScheme)
        } else if specifier::is_relative(spec) {
            probe.path(&ctx.parent.join(spec))
        } else if is_absolute_path(spec) {
            probe.path(Path::new(spec))
        } else {
            probe.bare(spec)
        };

        outcome.map_err(|code| NativeError {
            specifier: spec.to_string(),
            code,
            tried: probe.tried,
        })
    }
}

/// Check if a specifier is an absolute path.
fn is_absolute_path(spec: &str) -> bool {
    if spec.starts_with('/') || spec.starts_with("\\\\") {
        return true;
    }

    // Windows absolute: C:\, D:/
    let bytes = spec.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// State for a single resolution attempt.
struct Probe<'a> {
    resolver: &'a FsResolver,
    ctx: &'a RequestContext,
    tried: Vec<PathBuf>,
}

type Outcome = Result<PathBuf, NativeReasonCode>;

impl Probe<'_> {
    fn add_tried(&mut self, path: &Path) {
        if self.tried.len() < MAX_TRIED_PATHS {
            self.tried.push(path.to_path_buf());
        }
    }

    /// Exact file, then extension probing.
    fn file(&mut self, base: &Path) -> Option<PathBuf> {
        self.add_tried(base);
        if base.is_file() {
            return Some(canonical(base));
        }

        let file_name = base.file_name()?.to_string_lossy().into_owned();
        for ext in self.resolver.extensions {
            let with_ext = base.with_file_name(format!("{file_name}{ext}"));
            self.add_tried(&with_ext);
            if with_ext.is_file() {
                return Some(canonical(&with_ext));
            }
        }
        None
    }

    /// Resolve a path: file, probed file, or directory.
    fn path(&mut self, base: &Path) -> Outcome {
        if let Some(found) = self.file(base) {
            return Ok(found);
        }
        if base.is_dir() {
            return self.directory(base);
        }
        Err(NativeReasonCode::NotFound)
    }

    /// Resolve a directory (package.json exports > main > index.*).
    fn directory(&mut self, dir: &Path) -> Outcome {
        let pkg_json_path = dir.join("package.json");

        if pkg_json_path.is_file() {
            self.add_tried(&pkg_json_path);
            let pkg_json = read_package_json(&pkg_json_path)?;

            if let Some(exports) = pkg_json.get("exports") {
                return self.exports(dir, exports, "");
            }

            if let Some(main) = pkg_json.get("main").and_then(Value::as_str) {
                let main_path = dir.join(main);
                if let Some(found) = self.file(&main_path) {
                    return Ok(found);
                }
                if main_path.is_dir() {
                    if let Some(found) = self.index(&main_path) {
                        return Ok(found);
                    }
                }
            }
        }

        if let Some(found) = self.index(dir) {
            return Ok(found);
        }

        Err(NativeReasonCode::IsDirectory)
    }

    fn index(&mut self, dir: &Path) -> Option<PathBuf> {
        for ext in self.resolver.extensions {
            let index = dir.join(format!("index{ext}"));
            self.add_tried(&index);
            if index.is_file() {
                return Some(canonical(&index));
            }
        }
        None
    }

    /// Resolve `subpath` through a package's exports field.
    ///
    /// Exports are authoritative: a miss does not fall back to the
    /// filesystem layout.
    fn exports(&mut self, pkg_dir: &Path, exports: &Value, subpath: &str) -> Outcome {
        let map = ExportMap::from_package_exports(exports)
            .map_err(|_| NativeReasonCode::PackageJsonInvalid)?;
        let target = map
            .resolve(subpath, self.ctx.conditions.as_slice())
            .ok_or(NativeReasonCode::ExportsNotFound)?;

        let target_path = pkg_dir.join(target.trim_start_matches("./"));
        self.file(&target_path)
            .ok_or(NativeReasonCode::ExportsTargetNotFound)
    }

    /// Resolve a bare specifier via `node_modules`, walking up from the parent.
    fn bare(&mut self, spec: &str) -> Outcome {
        let parsed = specifier::parse(spec);
        let mut found_node_modules = false;
        let mut specific_error = None;
        let mut current = Some(self.ctx.parent.clone());

        while let Some(dir) = current {
            let node_modules = dir.join("node_modules");

            if node_modules.is_dir() {
                found_node_modules = true;
                let pkg_dir = node_modules.join(parsed.identity);
                self.add_tried(&pkg_dir);

                if pkg_dir.is_dir() {
                    match self.package(&pkg_dir, parsed.subpath) {
                        Ok(found) => return Ok(found),
                        Err(
                            code @ (NativeReasonCode::ExportsNotFound
                            | NativeReasonCode::ExportsTargetNotFound
                            | NativeReasonCode::PackageJsonInvalid),
                        ) => specific_error = Some(code),
                        Err(_) => {}
                    }
                }
            }

            current = dir.parent().map(Path::to_path_buf);
        }

        if let Some(code) = specific_error {
            return Err(code);
        }
        if found_node_modules {
            Err(NativeReasonCode::NotFound)
        } else {
            Err(NativeReasonCode::NodeModulesNotFound)
        }
    }

    /// Resolve a subpath inside a located package directory.
    fn package(&mut self, pkg_dir: &Path, subpath: &str) -> Outcome {
        if subpath.is_empty() {
            return self.path(pkg_dir);
        }

        let pkg_json_path = pkg_dir.join("package.json");
        if pkg_json_path.is_file() {
            self.add_tried(&pkg_json_path);
            let pkg_json = read_package_json(&pkg_json_path)?;
            if let Some(exports) = pkg_json.get("exports") {
                return self.exports(pkg_dir, exports, subpath);
            }
        }

        self.path(&pkg_dir.join(subpath.trim_start_matches('/')))
    }
}

fn read_package_json(path: &Path) -> Result<Value, NativeReasonCode> {
    let content =
        std::fs::read_to_string(path).map_err(|_| NativeReasonCode::PackageJsonInvalid)?;
    serde_json::from_str(&content).map_err(|_| NativeReasonCode::PackageJsonInvalid)
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("src/util.js"), "");

        let ctx = RequestContext::new(dir.path().join("src"));
        let resolved = FsResolver::new().resolve("./util", &ctx).unwrap();
        assert_eq!(resolved, canonical(&dir.path().join("src/util.js")));
    }

    #[test]
    fn test_dotted_file_name_probes_full_name() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("bar.cond.js"), "");

        let ctx = RequestContext::new(dir.path());
        let resolved = FsResolver::new().resolve("./bar.cond", &ctx).unwrap();
        assert_eq!(resolved, canonical(&dir.path().join("bar.cond.js")));
    }

    #[test]
    fn test_typescript_sources_need_opt_in() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("util.ts"), "");
        write(&dir.path().join("view.jsx"), "");

        let ctx = RequestContext::new(dir.path());
        for spec in ["./util", "./view"] {
            let err = FsResolver::new().resolve(spec, &ctx).unwrap_err();
            assert_eq!(err.code, NativeReasonCode::NotFound, "{spec}");
        }

        let resolver = FsResolver::new().with_extensions(&[".js", ".ts"]);
        assert_eq!(
            resolver.resolve("./util", &ctx).unwrap(),
            canonical(&dir.path().join("util.ts"))
        );
    }

    #[test]
    fn test_absolute_directory_index() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("lib/index.js"), "");

        let spec = dir.path().join("lib").to_string_lossy().into_owned();
        let ctx = RequestContext::new("/");
        let resolved = FsResolver::new().resolve(&spec, &ctx).unwrap();
        assert_eq!(resolved, canonical(&dir.path().join("lib/index.js")));
    }

    #[test]
    fn test_bare_package_main() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/foo");
        write(&pkg.join("package.json"), r#"{"name":"foo","main":"lib/main.js"}"#);
        write(&pkg.join("lib/main.js"), "");

        let ctx = RequestContext::new(dir.path().join("src"));
        let resolved = FsResolver::new().resolve("foo", &ctx).unwrap();
        assert_eq!(resolved, canonical(&pkg.join("lib/main.js")));
    }

    #[test]
    fn test_bare_scoped_subpath_without_exports() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@my/package-b");
        write(&pkg.join("package.json"), r#"{"name":"@my/package-b"}"#);
        write(&pkg.join("bar.js"), "");

        let ctx = RequestContext::new(dir.path());
        let resolved = FsResolver::new().resolve("@my/package-b/bar", &ctx).unwrap();
        assert_eq!(resolved, canonical(&pkg.join("bar.js")));
    }

    #[test]
    fn test_bare_exports_with_conditions() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@my/package-a");
        write(
            &pkg.join("package.json"),
            r#"{"name":"@my/package-a","exports":{".":"./index.js","./bar":{"cond":"./bar.cond.js","default":"./bar.js"}}}"#,
        );
        write(&pkg.join("index.js"), "");
        write(&pkg.join("bar.js"), "");
        write(&pkg.join("bar.cond.js"), "");

        let resolver = FsResolver::new();
        let plain = RequestContext::new(dir.path());
        let cond = RequestContext::new(dir.path()).with_conditions(["cond"]);

        assert_eq!(
            resolver.resolve("@my/package-a/bar", &plain).unwrap(),
            canonical(&pkg.join("bar.js"))
        );
        assert_eq!(
            resolver.resolve("@my/package-a/bar", &cond).unwrap(),
            canonical(&pkg.join("bar.cond.js"))
        );
        assert_eq!(
            resolver.resolve("@my/package-a", &cond).unwrap(),
            canonical(&pkg.join("index.js"))
        );

        let err = resolver.resolve("@my/package-a/hidden", &plain).unwrap_err();
        assert_eq!(err.code, NativeReasonCode::ExportsNotFound);
    }

    #[test]
    fn test_node_modules_not_found() {
        let dir = tempdir().unwrap();
        let ctx = RequestContext::new(dir.path());
        let err = FsResolver::new().resolve("nope", &ctx).unwrap_err();
        // A node_modules further up the real filesystem may exist.
        assert!(matches!(
            err.code,
            NativeReasonCode::NodeModulesNotFound | NativeReasonCode::NotFound
        ));
        assert_eq!(err.specifier, "nope");
    }

    #[test]
    fn test_missing_relative_reports_tried_paths() {
        let dir = tempdir().unwrap();
        let ctx = RequestContext::new(dir.path());
        let err = FsResolver::new().resolve("./missing", &ctx).unwrap_err();
        assert_eq!(err.code, NativeReasonCode::NotFound);
        assert!(!err.tried.is_empty());
        assert!(err.tried.len() <= MAX_TRIED_PATHS);
    }

    #[test]
    fn test_unsupported_and_invalid() {
        let ctx = RequestContext::new("/");
        let resolver = FsResolver::new();
        assert_eq!(
            resolver.resolve("node:fs", &ctx).unwrap_err().code,
            NativeReasonCode::UnsupportedScheme
        );
        assert_eq!(
            resolver.resolve("", &ctx).unwrap_err().code,
            NativeReasonCode::SpecifierInvalid
        );
    }

    #[test]
    fn test_error_display() {
        let err = NativeError::new("foo", NativeReasonCode::NotFound);
        assert_eq!(err.to_string(), "cannot resolve 'foo': NOT_FOUND");
    }
}
