use super::project_root;
use miette::Result;
use serde_json::{json, Map, Value};
use std::path::Path;
use vend_core::vendor::{self, BuildPlan, BuildReport, BUILD_SCHEMA_VERSION};
use vend_core::VendConfig;

/// Run the vendoring build for the project containing `cwd`.
///
/// With `dry_run`, the build is planned and printed but nothing is written.
pub fn run(cwd: &Path, dry_run: bool, json: bool) -> Result<()> {
    let outcome = project_root(cwd).and_then(|root| {
        let config = VendConfig::load(&root)?;
        tracing::debug!(root = %root.display(), packages = config.packages.len(), "loaded vend.json");

        if dry_run {
            let inputs = vendor::read_inputs(&root, &config)?;
            let plan = vendor::plan(&config, &inputs)?;
            Ok(Outcome::Planned(Box::new(plan)))
        } else {
            Ok(Outcome::Built(vendor::build(&root, &config)?))
        }
    });

    match outcome {
        Ok(Outcome::Built(report)) => print_report(&report, json),
        Ok(Outcome::Planned(plan)) => print_plan(&plan, json),
        Err(failure) => failure.exit(json, schema_fields()),
    }
    Ok(())
}

enum Outcome {
    Built(BuildReport),
    Planned(Box<BuildPlan>),
}

fn schema_fields() -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("schema_version".to_string(), json!(BUILD_SCHEMA_VERSION));
    fields
}

fn print_report(report: &BuildReport, json: bool) {
    if json {
        let mut out = Map::new();
        out.insert("ok".to_string(), Value::Bool(true));
        if let Ok(Value::Object(fields)) = serde_json::to_value(report) {
            out.extend(fields);
        }
        println!("{:#}", Value::Object(out));
        return;
    }

    println!("Vendored {} package(s) at version {}", report.packages.len(), report.version);
    for package in &report.packages {
        println!(
            "  {} ({}) -> {}  [{} files, {} markers]",
            package.identity,
            package.kind,
            package.vendored_root,
            package.files_copied,
            package.markers_rewritten
        );
    }
    for identity in &report.pass_through {
        println!("  {identity} (pass_through)");
    }
    if !report.dependencies.is_empty() {
        println!("Dependencies:");
        for (name, range) in &report.dependencies {
            println!("  {name}@{range}");
        }
    }
    println!("Aliases written to {}", report.alias_manifest.display());
}

fn print_plan(plan: &BuildPlan, json: bool) {
    let packages: Vec<Value> = plan
        .packages
        .iter()
        .map(|p| {
            json!({
                "identity": p.identity,
                "kind": p.kind().as_str(),
                "vendored_root": p.vendored_root,
                "source_dir": p.source_dir,
            })
        })
        .collect();
    let dependencies: Map<String, Value> = plan
        .dependencies
        .iter()
        .map(|(name, range)| (name.to_string(), Value::String(range.to_string())))
        .collect();

    if json {
        println!(
            "{:#}",
            json!({
                "ok": true,
                "schema_version": BUILD_SCHEMA_VERSION,
                "dry_run": true,
                "version": plan.version,
                "packages": packages,
                "pass_through": plan.pass_through,
                "dependencies": dependencies,
                "pinned": plan.pinned,
                "aliases": plan.aliases,
            })
        );
        return;
    }

    println!("Would vendor {} package(s) at version {}", plan.packages.len(), plan.version);
    for p in &plan.packages {
        println!("  {} ({}) -> {}", p.identity, p.kind().as_str(), p.vendored_root);
    }
    for (name, range) in plan.dependencies.iter() {
        println!("  dependency {name}@{range}");
    }
}
