//! Resolution interception for vendored packages.
//!
//! [`Interceptor`] sits in front of a [`NativeResolver`]. For every request
//! it parses the specifier, consults the [`AliasRegistry`], resolves through
//! the entry's export map when there is one, and hands the (possibly
//! rewritten) specifier to the native resolver for the final path step.
//!
//! A rewritten bare specifier may itself be a redirected identity. Such
//! re-entry is bounded by an explicit depth counter; exceeding it is
//! [`ResolveError::SelfReferenceOverflow`].

mod exports;
mod native;
pub mod trace;

pub(crate) use exports::json_type_name;
pub use exports::{ExportMap, ExportMapError, ExportMatch, ExportNode, DEFAULT_CONDITION};
pub use native::{
    FsResolver, NativeError, NativeReasonCode, NativeResolver, RequestContext, DEFAULT_EXTENSIONS,
};
pub use trace::{steps as trace_steps, RedirectTrace, TraceStep, TRACE_SCHEMA_VERSION};

use crate::alias::{AliasEntry, AliasRegistry};
use crate::specifier;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, trace as trace_event};

/// Default cap on chained redirections for a single request.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Errors surfaced by the interceptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("'{specifier}' exceeded {max_depth} chained redirections (self-reference loop?)")]
    SelfReferenceOverflow { specifier: String, max_depth: usize },

    #[error(transparent)]
    Native(#[from] NativeError),
}

impl ResolveError {
    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SelfReferenceOverflow { .. } => "SELF_REFERENCE_OVERFLOW",
            Self::Native(e) => e.code.as_str(),
        }
    }
}

/// What the interceptor decided to hand to native resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// The specifier passed to the native resolver.
    pub specifier: String,
    /// Whether it differs from the requested specifier.
    pub redirected: bool,
    /// Number of alias hops taken.
    pub hops: usize,
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub redirect: Redirect,
    pub path: PathBuf,
}

/// The outcome of one alias lookup step.
enum Step {
    /// Hand this specifier to native resolution.
    Delegate(String),
    /// Run the interceptor again on this specifier.
    Reenter(String),
}

/// The single interception point ahead of native resolution.
///
/// Holds only shared references and plain configuration, so one instance
/// can serve concurrent requests.
#[derive(Debug)]
pub struct Interceptor<'r, N> {
    registry: &'r AliasRegistry,
    native: N,
    max_depth: usize,
}

impl<'r, N: NativeResolver> Interceptor<'r, N> {
    /// Install `native` behind the alias table.
    pub fn new(registry: &'r AliasRegistry, native: N) -> Self {
        Self {
            registry,
            native,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the redirection depth cap.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &AliasRegistry {
        self.registry
    }

    /// Resolve `spec` to a concrete path.
    ///
    /// Native failures are returned unchanged.
    pub fn resolve(&self, spec: &str, ctx: &RequestContext) -> Result<PathBuf, ResolveError> {
        let redirect = self.redirect(spec, ctx)?;
        Ok(self.native.resolve(&redirect.specifier, ctx)?)
    }

    /// Like [`resolve`](Self::resolve), also reporting the redirect taken
    /// and every decision on the way.
    pub fn resolve_traced(
        &self,
        spec: &str,
        ctx: &RequestContext,
    ) -> (Result<Resolution, ResolveError>, RedirectTrace) {
        let mut trace = RedirectTrace::new();
        let result = self.walk(spec, ctx, Some(&mut trace)).and_then(|redirect| {
            let path = self.native.resolve(&redirect.specifier, ctx)?;
            Ok(Resolution { redirect, path })
        });
        (result, trace)
    }

    /// Compute the specifier handed to native resolution, without calling it.
    pub fn redirect(&self, spec: &str, ctx: &RequestContext) -> Result<Redirect, ResolveError> {
        self.walk(spec, ctx, None)
    }

    fn walk(
        &self,
        spec: &str,
        ctx: &RequestContext,
        mut trace: Option<&mut RedirectTrace>,
    ) -> Result<Redirect, ResolveError> {
        let mut current = spec.to_string();

        for depth in 0..=self.max_depth {
            match self.step(&current, ctx, depth, trace.as_deref_mut()) {
                Step::Delegate(target) => {
                    let redirected = target != spec;
                    if redirected {
                        debug!(specifier = spec, target = %target, hops = depth, "redirected");
                    }
                    return Ok(Redirect {
                        specifier: target,
                        redirected,
                        hops: depth,
                    });
                }
                Step::Reenter(next) => {
                    if let Some(t) = trace.as_deref_mut() {
                        let step = TraceStep::new(trace_steps::REENTER, true, depth, "bare target")
                            .with_target(next.clone());
                        t.push(step);
                    }
                    current = next;
                }
            }
        }

        Err(ResolveError::SelfReferenceOverflow {
            specifier: spec.to_string(),
            max_depth: self.max_depth,
        })
    }

    /// One lookup: parse, consult the registry, pick the next specifier.
    fn step(
        &self,
        spec: &str,
        ctx: &RequestContext,
        depth: usize,
        mut trace: Option<&mut RedirectTrace>,
    ) -> Step {
        let mut record = |step: TraceStep| {
            if let Some(t) = trace.as_deref_mut() {
                t.push(step);
            }
        };

        let parsed = specifier::parse(spec);
        record(TraceStep::new(
            trace_steps::PARSE_SPECIFIER,
            true,
            depth,
            format!("identity '{}', subpath '{}'", parsed.identity, parsed.subpath),
        ));

        let Some(entry) = self.registry.lookup(parsed.identity) else {
            record(TraceStep::new(
                trace_steps::LOOKUP_ALIAS,
                false,
                depth,
                format!("no alias for '{}'", parsed.identity),
            ));
            record(
                TraceStep::new(trace_steps::PASS_THROUGH, true, depth, "unmodified")
                    .with_target(spec),
            );
            return Step::Delegate(spec.to_string());
        };

        record(TraceStep::new(
            trace_steps::LOOKUP_ALIAS,
            true,
            depth,
            format!("'{}' is a {} alias", entry.identity, entry.kind().as_str()),
        ));
        trace_event!(identity = %entry.identity, kind = entry.kind().as_str(), "alias hit");

        if let Some(map) = &entry.export_map {
            match map.resolve_match(parsed.subpath, ctx.conditions.as_slice()) {
                Some(found) => {
                    record(
                        TraceStep::new(trace_steps::RESOLVE_EXPORTS, true, depth, "export matched")
                            .with_key(found.key.clone())
                            .with_conditions(found.conditions.clone())
                            .with_target(found.target.clone()),
                    );
                    return Self::follow_target(entry, &found.target);
                }
                None => record(TraceStep::new(
                    trace_steps::RESOLVE_EXPORTS,
                    false,
                    depth,
                    format!("no export for '{}'", parsed.export_key()),
                )),
            }
        }

        if let Some(path) = entry.vendored_path(parsed.subpath) {
            record(
                TraceStep::new(trace_steps::VENDORED_PATH, true, depth, "vendored root + subpath")
                    .with_target(path.clone()),
            );
            return Step::Delegate(path);
        }

        record(
            TraceStep::new(trace_steps::PASS_THROUGH, true, depth, "alias has no redirection")
                .with_target(spec),
        );
        Step::Delegate(spec.to_string())
    }

    /// Relative targets are concrete paths inside the vendored tree; anything
    /// else is a fresh specifier that goes through interception again.
    fn follow_target(entry: &AliasEntry, target: &str) -> Step {
        if specifier::is_relative(target) {
            Step::Delegate(entry.anchored(target))
        } else {
            Step::Reenter(target.to_string())
        }
    }
}
