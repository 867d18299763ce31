use super::{load_config_or_default, load_registry, project_root};
use miette::Result;
use serde_json::{json, Map, Value};
use std::path::Path;
use vend_core::alias::ALIAS_SCHEMA_VERSION;

/// List the alias registry of the project containing `cwd`.
pub fn run(cwd: &Path, json: bool) -> Result<()> {
    let loaded = project_root(cwd)
        .and_then(|root| load_config_or_default(&root).map(|config| (root, config)))
        .and_then(|(root, config)| load_registry(&root, &config));
    let (path, registry) = match loaded {
        Ok(loaded) => loaded,
        Err(failure) => failure.exit(json, Map::new()),
    };

    if json {
        let aliases: Vec<Value> = registry
            .iter()
            .map(|entry| {
                json!({
                    "identity": entry.identity,
                    "kind": entry.kind().as_str(),
                    "vendored_root": entry.vendored_root,
                    "exports": entry.export_map,
                })
            })
            .collect();
        println!(
            "{:#}",
            json!({
                "ok": true,
                "schema_version": ALIAS_SCHEMA_VERSION,
                "alias_manifest": path,
                "aliases": aliases,
            })
        );
        return Ok(());
    }

    if registry.is_empty() {
        println!("No aliases ({} not found or empty)", path.display());
        return Ok(());
    }
    for entry in registry.iter() {
        let kind = entry.kind().as_str();
        match &entry.vendored_root {
            Some(root) => println!("{:<32} {kind:<12} {root}", entry.identity),
            None => println!("{:<32} {kind}", entry.identity),
        }
    }
    Ok(())
}
