//! Conditional export map evaluation.
//!
//! An export map maps export keys (`.`, `./bar`, `./features/*`) to nodes.
//! A node is either a literal target or an ordered condition map whose
//! values are nested nodes. Conditions are selected in the caller's
//! priority order, with `default` as the last resort.

use crate::specifier::export_key;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Condition consulted when none of the active conditions match.
pub const DEFAULT_CONDITION: &str = "default";

/// A node of an export map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportNode {
    /// A literal specifier or path.
    Target(String),
    /// Condition name to nested node, in declaration order.
    Conditions(IndexMap<String, ExportNode>),
}

impl ExportNode {
    /// Convenience constructor for a target node.
    pub fn target(target: impl Into<String>) -> Self {
        Self::Target(target.into())
    }

    /// Build a condition node from `(condition, node)` pairs.
    pub fn conditions<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, ExportNode)>,
        K: Into<String>,
    {
        Self::Conditions(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn try_map<E>(&self, f: &mut impl FnMut(&str) -> Result<String, E>) -> Result<Self, E> {
        match self {
            Self::Target(t) => Ok(Self::Target(f(t)?)),
            Self::Conditions(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (condition, node) in map {
                    out.insert(condition.clone(), node.try_map(f)?);
                }
                Ok(Self::Conditions(out))
            }
        }
    }

    fn collect_targets<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Target(t) => out.push(t),
            Self::Conditions(map) => {
                for node in map.values() {
                    node.collect_targets(out);
                }
            }
        }
    }
}

/// Errors produced while reading a package's `exports` field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExportMapError {
    #[error("invalid exports value at '{path}': expected string or object, got {found}")]
    InvalidValue { path: String, found: &'static str },

    #[error("exports object mixes subpath keys and condition keys")]
    MixedKeys,
}

/// The result of a successful export lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMatch {
    /// The export key that matched (`.`, `./bar`, or a `*` pattern).
    pub key: String,
    /// Conditions taken from the outermost condition map inwards.
    pub conditions: Vec<String>,
    /// The selected target, with any `*` substituted.
    pub target: String,
}

/// A package export map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportMap {
    entries: IndexMap<String, ExportNode>,
}

impl ExportMap {
    /// Create an empty export map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any existing node for `key`.
    pub fn insert(&mut self, key: impl Into<String>, node: ExportNode) {
        self.entries.insert(key.into(), node);
    }

    /// Node declared for an exact export key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ExportNode> {
        self.entries.get(key)
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExportNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All target strings, depth-first in declaration order.
    #[must_use]
    pub fn targets(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for node in self.entries.values() {
            node.collect_targets(&mut out);
        }
        out
    }

    /// Normalize a package manifest `exports` value.
    ///
    /// Supported shapes:
    /// - `"./index.js"` becomes `{ ".": "./index.js" }`
    /// - `{ "import": ..., "default": ... }` (no `.` keys) becomes `{ ".": {...} }`
    /// - `{ ".": ..., "./bar": ... }` is taken as-is
    pub fn from_package_exports(exports: &Value) -> Result<Self, ExportMapError> {
        let mut map = Self::new();
        match exports {
            Value::String(s) => map.insert(".", ExportNode::target(s.clone())),
            Value::Object(obj) => {
                let subpath_keys = obj.keys().filter(|k| k.starts_with('.')).count();
                if subpath_keys == 0 {
                    map.insert(".", node_from_value(exports, "exports")?);
                } else if subpath_keys == obj.len() {
                    for (key, value) in obj {
                        map.insert(key.clone(), node_from_value(value, key)?);
                    }
                } else {
                    return Err(ExportMapError::MixedKeys);
                }
            }
            other => {
                return Err(ExportMapError::InvalidValue {
                    path: "exports".to_string(),
                    found: json_type_name(other),
                })
            }
        }
        Ok(map)
    }

    /// Resolve an internal subpath (`""` or `"/bar"`) to a target.
    ///
    /// Returns `None` when there is no entry for the subpath or when no
    /// condition (including `default`) matches. Never fails.
    #[must_use]
    pub fn resolve<S: AsRef<str>>(&self, subpath: &str, conditions: &[S]) -> Option<String> {
        self.resolve_match(subpath, conditions).map(|m| m.target)
    }

    /// Like [`resolve`](Self::resolve), but reports which key and
    /// conditions produced the target.
    #[must_use]
    pub fn resolve_match<S: AsRef<str>>(
        &self,
        subpath: &str,
        conditions: &[S],
    ) -> Option<ExportMatch> {
        let key = export_key(subpath);

        if let Some(node) = self.entries.get(key.as_ref()) {
            let (target, taken) = select_target(node, conditions)?;
            return Some(ExportMatch {
                key: key.into_owned(),
                conditions: taken,
                target: target.to_string(),
            });
        }

        self.resolve_pattern(&key, conditions)
    }

    /// Rebuild the map with every target passed through `f`.
    ///
    /// Keys, nesting and condition order are preserved exactly. The first
    /// error aborts the rewrite and no partial map is returned.
    pub fn try_map_targets<E>(
        &self,
        mut f: impl FnMut(&str) -> Result<String, E>,
    ) -> Result<Self, E> {
        let mut entries = IndexMap::with_capacity(self.entries.len());
        for (key, node) in &self.entries {
            entries.insert(key.clone(), node.try_map(&mut f)?);
        }
        Ok(Self { entries })
    }

    /// Match `key` against single-`*` pattern keys.
    ///
    /// The most specific pattern (longest key) wins; ties go to the
    /// lexicographically smaller key.
    fn resolve_pattern<S: AsRef<str>>(&self, key: &str, conditions: &[S]) -> Option<ExportMatch> {
        let mut best: Option<(&str, &ExportNode, &str)> = None;

        for (pattern, node) in &self.entries {
            if pattern.matches('*').count() != 1 {
                continue;
            }
            let Some(star) = match_pattern(pattern, key) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((current, _, _)) => {
                    pattern.len() > current.len()
                        || (pattern.len() == current.len() && pattern.as_str() < current)
                }
            };
            if better {
                best = Some((pattern.as_str(), node, star));
            }
        }

        let (pattern, node, star) = best?;
        let (target, taken) = select_target(node, conditions)?;
        let target = substitute_star(target, star)?;

        Some(ExportMatch {
            key: pattern.to_string(),
            conditions: taken,
            target,
        })
    }
}

impl<K: Into<String>> FromIterator<(K, ExportNode)> for ExportMap {
    fn from_iter<T: IntoIterator<Item = (K, ExportNode)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Walk condition maps until a target is reached.
///
/// At each level the first active condition present wins, then `default`.
/// A chosen branch is committed to; there is no backtracking.
fn select_target<'m, S: AsRef<str>>(
    node: &'m ExportNode,
    conditions: &[S],
) -> Option<(&'m str, Vec<String>)> {
    let mut node = node;
    let mut taken = Vec::new();

    loop {
        match node {
            ExportNode::Target(t) => return Some((t.as_str(), taken)),
            ExportNode::Conditions(map) => {
                let (name, next) = conditions
                    .iter()
                    .find_map(|c| map.get_key_value(c.as_ref()))
                    .or_else(|| map.get_key_value(DEFAULT_CONDITION))?;
                taken.push(name.clone());
                node = next;
            }
        }
    }
}

/// Match a pattern key against an export key, returning the `*` value.
///
/// `"./features/*"` against `"./features/foo"` yields `"foo"`. Empty
/// matches and matches containing a `..` segment are rejected.
fn match_pattern<'k>(pattern: &str, key: &'k str) -> Option<&'k str> {
    let star_pos = pattern.find('*')?;
    let prefix = &pattern[..star_pos];
    let suffix = &pattern[star_pos + 1..];

    if !key.starts_with(prefix) || !key.ends_with(suffix) {
        return None;
    }

    let start = prefix.len();
    let end = key.len().checked_sub(suffix.len())?;
    if start >= end {
        return None;
    }

    let star = &key[start..end];
    if star.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(star)
}

/// Substitute the single `*` in `target`.
fn substitute_star(target: &str, star: &str) -> Option<String> {
    if target.matches('*').count() != 1 {
        return None;
    }
    Some(target.replacen('*', star, 1))
}

fn node_from_value(value: &Value, path: &str) -> Result<ExportNode, ExportMapError> {
    match value {
        Value::String(s) => Ok(ExportNode::Target(s.clone())),
        Value::Object(obj) => {
            let mut map = IndexMap::with_capacity(obj.len());
            for (condition, nested) in obj {
                let nested_path = format!("{path}.{condition}");
                map.insert(condition.clone(), node_from_value(nested, &nested_path)?);
            }
            Ok(ExportNode::Conditions(map))
        }
        other => Err(ExportMapError::InvalidValue {
            path: path.to_string(),
            found: json_type_name(other),
        }),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NONE: &[&str] = &[];

    fn package_a() -> ExportMap {
        ExportMap::from_package_exports(&json!({
            ".": "T1",
            "./bar": { "server": "T2", "default": "T3" }
        }))
        .unwrap()
    }

    #[test]
    fn test_root_key_for_empty_subpath() {
        assert_eq!(package_a().resolve("", NONE), Some("T1".to_string()));
    }

    #[test]
    fn test_condition_selected() {
        assert_eq!(
            package_a().resolve("/bar", &["server"]),
            Some("T2".to_string())
        );
    }

    #[test]
    fn test_default_when_no_condition_matches() {
        assert_eq!(package_a().resolve("/bar", NONE), Some("T3".to_string()));
        assert_eq!(
            package_a().resolve("/bar", &["browser"]),
            Some("T3".to_string())
        );
    }

    #[test]
    fn test_missing_key_is_not_found() {
        assert_eq!(package_a().resolve("/baz", &["server"]), None);
    }

    #[test]
    fn test_no_matching_condition_and_no_default_is_not_found() {
        let map = ExportMap::from_package_exports(&json!({
            "./x": { "server": "./server.js", "worker": "./worker.js" }
        }))
        .unwrap();
        assert_eq!(map.resolve("/x", &["browser"]), None);
        assert_eq!(map.resolve("/x", NONE), None);
    }

    #[test]
    fn test_caller_priority_order_wins_over_declaration_order() {
        let map = ExportMap::from_package_exports(&json!({
            ".": { "require": "./cjs.js", "import": "./esm.js" }
        }))
        .unwrap();
        assert_eq!(
            map.resolve("", &["import", "require"]),
            Some("./esm.js".to_string())
        );
        assert_eq!(
            map.resolve("", &["require", "import"]),
            Some("./cjs.js".to_string())
        );
    }

    #[test]
    fn test_nested_conditions() {
        let map = ExportMap::from_package_exports(&json!({
            "./bar": {
                "react-server": { "cond": "./bar.cond.js", "default": "./bar.server.js" },
                "default": "./bar.js"
            }
        }))
        .unwrap();
        let m = map.resolve_match("/bar", &["react-server", "cond"]).unwrap();
        assert_eq!(m.target, "./bar.cond.js");
        assert_eq!(m.conditions, vec!["react-server", "cond"]);
        assert_eq!(m.key, "./bar");

        assert_eq!(
            map.resolve("/bar", &["react-server"]),
            Some("./bar.server.js".to_string())
        );
        assert_eq!(map.resolve("/bar", NONE), Some("./bar.js".to_string()));
    }

    #[test]
    fn test_committed_branch_does_not_backtrack() {
        let map = ExportMap::from_package_exports(&json!({
            ".": {
                "server": { "worker": "./w.js" },
                "default": "./d.js"
            }
        }))
        .unwrap();
        assert_eq!(map.resolve("", &["server"]), None);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let map = package_a();
        let first = map.resolve("", &["server"]);
        let second = map.resolve("", &["server"]);
        assert_eq!(first, second);
        assert_eq!(map, package_a());
    }

    #[test]
    fn test_string_exports_normalized_to_root() {
        let map = ExportMap::from_package_exports(&json!("./dist/index.js")).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.resolve("", NONE), Some("./dist/index.js".to_string()));
        assert_eq!(map.resolve("/other", NONE), None);
    }

    #[test]
    fn test_root_condition_object_normalized() {
        let map = ExportMap::from_package_exports(&json!({
            "import": "./esm.js",
            "default": "./default.js"
        }))
        .unwrap();
        assert_eq!(map.resolve("", &["import"]), Some("./esm.js".to_string()));
        assert_eq!(map.resolve("", NONE), Some("./default.js".to_string()));
    }

    #[test]
    fn test_mixed_keys_rejected() {
        let err = ExportMap::from_package_exports(&json!({
            ".": "./index.js",
            "import": "./esm.js"
        }))
        .unwrap_err();
        assert_eq!(err, ExportMapError::MixedKeys);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ExportMap::from_package_exports(&json!({ "./x": null })).unwrap_err();
        assert_eq!(
            err,
            ExportMapError::InvalidValue {
                path: "./x".to_string(),
                found: "null"
            }
        );

        let err = ExportMap::from_package_exports(&json!({ "./x": { "node": 3 } })).unwrap_err();
        assert!(err.to_string().contains("./x.node"));

        assert!(ExportMap::from_package_exports(&json!(["./a.js"])).is_err());
    }

    #[test]
    fn test_pattern_simple() {
        let map = ExportMap::from_package_exports(&json!({
            ".": "./index.js",
            "./*": "./dist/*.js"
        }))
        .unwrap();
        assert_eq!(map.resolve("/foo", NONE), Some("./dist/foo.js".to_string()));
    }

    #[test]
    fn test_pattern_specificity() {
        let map = ExportMap::from_package_exports(&json!({
            "./*": "./dist/*.js",
            "./features/*": "./dist/features/*.js"
        }))
        .unwrap();
        let m = map.resolve_match("/features/auth", NONE).unwrap();
        assert_eq!(m.key, "./features/*");
        assert_eq!(m.target, "./dist/features/auth.js");
        assert_eq!(map.resolve("/utils", NONE), Some("./dist/utils.js".to_string()));
    }

    #[test]
    fn test_exact_key_before_pattern() {
        let map = ExportMap::from_package_exports(&json!({
            "./*": "./dist/*.js",
            "./special": "./special/index.js"
        }))
        .unwrap();
        assert_eq!(
            map.resolve("/special", NONE),
            Some("./special/index.js".to_string())
        );
    }

    #[test]
    fn test_pattern_conditional() {
        let map = ExportMap::from_package_exports(&json!({
            "./*": { "import": "./esm/*.mjs", "require": "./cjs/*.cjs" }
        }))
        .unwrap();
        assert_eq!(
            map.resolve("/utils", &["require"]),
            Some("./cjs/utils.cjs".to_string())
        );
    }

    #[test]
    fn test_pattern_rejects_traversal_and_empty() {
        let map = ExportMap::from_package_exports(&json!({
            "./features/*": "./dist/features/*.js"
        }))
        .unwrap();
        assert_eq!(map.resolve("/features/", NONE), None);
        assert_eq!(map.resolve("/features/../secret", NONE), None);
    }

    #[test]
    fn test_try_map_targets_preserves_structure() {
        let original = ExportMap::from_package_exports(&json!({
            "./bar": { "server": "./bar.server.js", "default": "./bar.js" },
            ".": "./index.js"
        }))
        .unwrap();

        let mapped = original
            .try_map_targets(|t| Ok::<_, ()>(format!("{t}?v")))
            .unwrap();

        let keys: Vec<&str> = mapped.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["./bar", "."]);
        assert_eq!(
            mapped.get("./bar"),
            Some(&ExportNode::conditions([
                ("server", ExportNode::target("./bar.server.js?v")),
                ("default", ExportNode::target("./bar.js?v")),
            ]))
        );
        assert_eq!(
            mapped.targets(),
            vec!["./bar.server.js?v", "./bar.js?v", "./index.js?v"]
        );
    }

    #[test]
    fn test_try_map_targets_stops_on_error() {
        let original = package_a();
        let result = original.try_map_targets(|t| {
            if t == "T2" {
                Err(format!("bad target {t}"))
            } else {
                Ok(t.to_string())
            }
        });
        assert_eq!(result, Err("bad target T2".to_string()));
    }

    #[test]
    fn test_serde_preserves_order_and_shape() {
        let map = package_a();
        let text = serde_json::to_string(&map).unwrap();
        assert_eq!(
            text,
            r#"{".":"T1","./bar":{"server":"T2","default":"T3"}}"#
        );
        let back: ExportMap = serde_json::from_str(&text).unwrap();
        assert_eq!(back, map);
    }
}
