//! Redirect tracing for `vend resolve`.
//!
//! Records each decision the interceptor takes for a specifier so the CLI
//! can explain why a request ended up where it did.

use serde::Serialize;

/// Schema version for the trace output format.
pub const TRACE_SCHEMA_VERSION: u32 = 1;

/// A single step in a redirect trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    /// Step name (see [`steps`]).
    pub step: &'static str,
    /// Whether this step produced a result.
    pub ok: bool,
    /// Human-readable description of what happened.
    pub detail: String,
    /// Redirect depth at which the step ran.
    pub depth: usize,
    /// Export map key matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Conditions taken, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    /// Target produced by this step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl TraceStep {
    pub fn new(step: &'static str, ok: bool, depth: usize, detail: impl Into<String>) -> Self {
        Self {
            step,
            ok,
            detail: detail.into(),
            depth,
            key: None,
            conditions: Vec::new(),
            target: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<String>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Ordered list of redirect steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedirectTrace {
    pub steps: Vec<TraceStep>,
}

impl RedirectTrace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    /// Step names in order, handy for assertions.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.step).collect()
    }
}

/// Step names used in redirect tracing.
pub mod steps {
    pub const PARSE_SPECIFIER: &str = "parse_specifier";
    pub const LOOKUP_ALIAS: &str = "lookup_alias";
    pub const RESOLVE_EXPORTS: &str = "resolve_exports";
    pub const VENDORED_PATH: &str = "vendored_path";
    pub const REENTER: &str = "reenter";
    pub const PASS_THROUGH: &str = "pass_through";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_builder() {
        let step = TraceStep::new(steps::RESOLVE_EXPORTS, true, 0, "matched")
            .with_key("./bar")
            .with_conditions(vec!["server".to_string()])
            .with_target("./bar.server.js");
        assert_eq!(step.key.as_deref(), Some("./bar"));
        assert_eq!(step.conditions, vec!["server"]);
        assert_eq!(step.target.as_deref(), Some("./bar.server.js"));
    }

    #[test]
    fn test_serialized_step_omits_empty_fields() {
        let step = TraceStep::new(steps::PASS_THROUGH, true, 1, "no alias");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step"], "pass_through");
        assert_eq!(json["depth"], 1);
        assert!(json.get("key").is_none());
        assert!(json.get("conditions").is_none());
        assert!(json.get("target").is_none());
    }

    #[test]
    fn test_names() {
        let mut trace = RedirectTrace::new();
        trace.push(TraceStep::new(steps::PARSE_SPECIFIER, true, 0, "a"));
        trace.push(TraceStep::new(steps::LOOKUP_ALIAS, false, 0, "b"));
        assert_eq!(trace.names(), vec!["parse_specifier", "lookup_alias"]);
    }
}
