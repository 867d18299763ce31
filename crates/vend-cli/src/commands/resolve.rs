use super::{load_config_or_default, load_registry, project_root, Failure};
use miette::Result;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use vend_core::paths::resolve_against;
use vend_core::resolver::{RedirectTrace, TRACE_SCHEMA_VERSION};
use vend_core::{FsResolver, Interceptor, RequestContext};

/// Arguments of `vend resolve`.
#[derive(Debug)]
pub struct ResolveAction {
    pub cwd: PathBuf,
    pub specifier: String,
    pub conditions: Vec<String>,
    /// Importer directory; defaults to `cwd`.
    pub parent: Option<PathBuf>,
    pub max_depth: Option<usize>,
}

pub fn run(action: ResolveAction, json: bool) -> Result<()> {
    let parent = action
        .parent
        .as_deref()
        .map_or_else(|| action.cwd.clone(), |p| resolve_against(&action.cwd, p));

    let loaded = project_root(&action.cwd)
        .and_then(|root| load_config_or_default(&root).map(|config| (root, config)))
        .and_then(|(root, config)| load_registry(&root, &config));
    let (manifest_path, registry) = match loaded {
        Ok(loaded) => loaded,
        Err(failure) => failure.exit(json, Map::new()),
    };

    let mut interceptor = Interceptor::new(&registry, FsResolver::new());
    if let Some(depth) = action.max_depth {
        interceptor = interceptor.with_max_depth(depth);
    }
    let ctx = RequestContext::new(&parent).with_conditions(action.conditions.iter().cloned());

    let (result, trace) = interceptor.resolve_traced(&action.specifier, &ctx);
    let resolution = match result {
        Ok(resolution) => resolution,
        Err(e) => Failure::from(e).exit(json, trace_fields(&trace)),
    };

    if json {
        let mut out = json!({
            "ok": true,
            "specifier": action.specifier,
            "conditions": action.conditions,
            "parent": parent,
            "alias_manifest": manifest_path,
            "redirected": resolution.redirect.redirected,
            "delegated": resolution.redirect.specifier,
            "hops": resolution.redirect.hops,
            "resolved": resolution.path,
        });
        if let Value::Object(obj) = &mut out {
            obj.extend(trace_fields(&trace));
        }
        println!("{out:#}");
    } else {
        if resolution.redirect.redirected {
            println!("{} -> {}", action.specifier, resolution.redirect.specifier);
        }
        println!("{}", resolution.path.display());
    }
    Ok(())
}

fn trace_fields(trace: &RedirectTrace) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "trace".to_string(),
        json!({ "schema_version": TRACE_SCHEMA_VERSION, "steps": trace.steps }),
    );
    fields
}
