#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::return_self_not_must_use)]

pub mod alias;
pub mod config;
pub mod error;
pub mod paths;
pub mod resolver;
pub mod specifier;
pub mod vendor;
pub mod version;

pub use alias::{AliasEntry, AliasKind, AliasManifest, AliasRegistry, DEFAULT_ALIAS_MANIFEST};
pub use config::{Config, MarkerRewrite, VendConfig, VEND_CONFIG_FILE};
pub use error::Error;
pub use resolver::{
    ExportMap, ExportNode, FsResolver, Interceptor, NativeError, NativeResolver, Redirect,
    RedirectTrace, RequestContext, Resolution, ResolveError, DEFAULT_MAX_DEPTH,
};
pub use specifier::Specifier;
pub use vendor::{BuildPlan, BuildReport, VendorError};
pub use version::VERSION;
