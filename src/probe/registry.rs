//! Probe registry and dispatch.
//!
//! # Responsibilities
//! - Map probe names to probe functions
//! - Dispatch a single probe by name, or every probe in name order
//! - Apply the configured failure policy to the "all probes" pass
//!
//! # Design Decisions
//! - Reader/writer lock: dispatches share the map, registration is exclusive
//! - The lock is never held across an await; dispatch clones the functions it
//!   needs out of the map first
//! - Last registration under a name wins

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::probe::{ProbeContext, ProbeError, ProbeResult};

/// Boxed future returned by a probe function.
pub type ProbeFuture = BoxFuture<'static, Result<ProbeResult, ProbeError>>;

/// Type-erased probe function.
pub type ProbeFn = Arc<dyn Fn(ProbeContext) -> ProbeFuture + Send + Sync>;

/// How the "all probes" pass reacts to a failing probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failure and surface it as the dispatch error.
    #[default]
    Abort,
    /// Keep going; each failure becomes an error-shaped result in the list.
    Collect,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    One(ProbeResult),
    All(Vec<ProbeResult>),
}

/// Registry of named probe functions.
pub struct ProbeRegistry {
    probes: RwLock<HashMap<String, ProbeFn>>,
    policy: FailurePolicy,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::with_policy(FailurePolicy::default())
    }

    pub fn with_policy(policy: FailurePolicy) -> Self {
        Self {
            probes: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Register an async probe function, replacing any previous binding.
    pub fn register<F, Fut>(&self, name: impl Into<String>, probe: F)
    where
        F: Fn(ProbeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ProbeResult, ProbeError>> + Send + 'static,
    {
        let probe: ProbeFn = Arc::new(move |ctx| Box::pin(probe(ctx)) as ProbeFuture);
        self.register_fn(name, probe);
    }

    /// Register an already type-erased probe function.
    pub fn register_fn(&self, name: impl Into<String>, probe: ProbeFn) {
        let name = name.into();
        let replaced = self.probes.write().insert(name.clone(), probe).is_some();
        if replaced {
            tracing::debug!(probe = %name, "Probe re-registered; previous binding replaced");
        } else {
            tracing::debug!(probe = %name, "Probe registered");
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.probes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.probes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.read().is_empty()
    }

    /// Run the named probe, or every probe when `name` is empty.
    pub async fn dispatch(&self, ctx: &ProbeContext, name: &str) -> Result<Dispatch, ProbeError> {
        if name.is_empty() {
            self.dispatch_all(ctx).await.map(Dispatch::All)
        } else {
            self.dispatch_one(ctx, name).await.map(Dispatch::One)
        }
    }

    async fn dispatch_one(&self, ctx: &ProbeContext, name: &str) -> Result<ProbeResult, ProbeError> {
        let probe = self
            .probes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ProbeError::NotFound(name.to_string()))?;

        probe(ctx.clone()).await
    }

    async fn dispatch_all(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>, ProbeError> {
        let mut snapshot: Vec<(String, ProbeFn)> = self
            .probes
            .read()
            .iter()
            .map(|(name, probe)| (name.clone(), probe.clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));

        let mut results = Vec::with_capacity(snapshot.len());
        for (name, probe) in snapshot {
            ctx.check_cancelled()?;

            match probe(ctx.clone()).await {
                Ok(result) => results.push(result),
                Err(ProbeError::Cancelled) => return Err(ProbeError::Cancelled),
                Err(err) => match self.policy {
                    FailurePolicy::Abort => {
                        tracing::warn!(
                            request_id = %ctx.request_id(),
                            probe = %name,
                            error = %err,
                            "Probe failed; aborting dispatch"
                        );
                        return Err(err);
                    }
                    FailurePolicy::Collect => {
                        tracing::warn!(
                            request_id = %ctx.request_id(),
                            probe = %name,
                            error = %err,
                            "Probe failed; recording error result"
                        );
                        results.push(error_result(&name, &err));
                    }
                },
            }
        }

        // Probes choose their own result name; sort on that, stable for ties.
        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("probes", &self.names())
            .field("policy", &self.policy)
            .finish()
    }
}

fn error_result(name: &str, err: &ProbeError) -> ProbeResult {
    ProbeResult::new(name)
        .with_summary(format!("error: {err}"))
        .with("error", err)
        .with("code", err.status().as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    fn fixed(name: &'static str) -> impl Fn(ProbeContext) -> futures_util::future::Ready<Result<ProbeResult, ProbeError>> {
        move |_ctx| futures_util::future::ready(Ok(ProbeResult::new(name).with("probe", name)))
    }

    fn failing(message: &'static str) -> impl Fn(ProbeContext) -> futures_util::future::Ready<Result<ProbeResult, ProbeError>> {
        move |_ctx| futures_util::future::ready(Err(ProbeError::failed(message)))
    }

    fn names_of(dispatch: Dispatch) -> Vec<String> {
        match dispatch {
            Dispatch::All(results) => results.into_iter().map(|r| r.name).collect(),
            Dispatch::One(result) => vec![result.name],
        }
    }

    #[tokio::test]
    async fn dispatch_by_name_invokes_only_that_probe() {
        let registry = ProbeRegistry::new();
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));

        let counter = a_calls.clone();
        registry.register("a", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProbeError>(ProbeResult::new("a")) }
        });
        let counter = b_calls.clone();
        registry.register("b", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProbeError>(ProbeResult::new("b")) }
        });

        let out = registry.dispatch(&ProbeContext::detached(), "a").await.unwrap();

        assert_eq!(out, Dispatch::One(ProbeResult::new("a")));
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let registry = ProbeRegistry::new();
        registry.register("status", fixed("status"));

        let err = registry.dispatch(&ProbeContext::detached(), "nope").await.unwrap_err();

        assert!(matches!(err, ProbeError::NotFound(ref n) if n == "nope"));
    }

    #[tokio::test]
    async fn all_probes_sorted_regardless_of_registration_order() {
        let orders: [[&'static str; 4]; 3] = [
            ["d", "c", "b", "a"],
            ["b", "d", "a", "c"],
            ["a", "b", "c", "d"],
        ];

        for order in orders {
            let registry = ProbeRegistry::new();
            for name in order {
                registry.register(name, fixed(name));
            }
            let out = registry.dispatch(&ProbeContext::detached(), "").await.unwrap();
            assert_eq!(names_of(out), vec!["a", "b", "c", "d"]);
        }
    }

    #[tokio::test]
    async fn empty_registry_dispatches_empty_list() {
        let registry = ProbeRegistry::new();
        let out = registry.dispatch(&ProbeContext::detached(), "").await.unwrap();
        assert_eq!(out, Dispatch::All(Vec::new()));
    }

    #[tokio::test]
    async fn re_registering_replaces_previous_probe() {
        let registry = ProbeRegistry::new();
        let old_calls = Arc::new(AtomicUsize::new(0));

        let counter = old_calls.clone();
        registry.register("status", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProbeError>(ProbeResult::new("status").with("version", "old")) }
        });
        registry.register("status", |_ctx| async {
            Ok::<_, ProbeError>(ProbeResult::new("status").with("version", "new"))
        });

        let out = registry.dispatch(&ProbeContext::detached(), "status").await.unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(out, Dispatch::One(ProbeResult::new("status").with("version", "new")));
        assert_eq!(old_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_probe_error_propagates() {
        let registry = ProbeRegistry::new();
        registry.register("broken", failing("sensor unavailable"));

        let err = registry.dispatch(&ProbeContext::detached(), "broken").await.unwrap_err();

        assert_eq!(err.to_string(), "sensor unavailable");
    }

    #[tokio::test]
    async fn abort_policy_stops_at_first_failure() {
        let registry = ProbeRegistry::with_policy(FailurePolicy::Abort);
        let late_calls = Arc::new(AtomicUsize::new(0));

        registry.register("a", fixed("a"));
        registry.register("b", failing("b exploded"));
        let counter = late_calls.clone();
        registry.register("c", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProbeError>(ProbeResult::new("c")) }
        });

        let err = registry.dispatch(&ProbeContext::detached(), "").await.unwrap_err();

        assert_eq!(err.to_string(), "b exploded");
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn collect_policy_reports_failures_inline() {
        let registry = ProbeRegistry::with_policy(FailurePolicy::Collect);
        registry.register("c", fixed("c"));
        registry.register("b", failing("b exploded"));
        registry.register("a", fixed("a"));

        let out = registry.dispatch(&ProbeContext::detached(), "").await.unwrap();
        let Dispatch::All(results) = out else {
            panic!("expected list");
        };

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].name, "b");
        assert_eq!(results[1].summary, "error: b exploded");
        assert_eq!(results[1].data["error"], "b exploded");
        assert_eq!(results[1].data["code"], "500");
        assert_eq!(results[2].name, "c");
    }

    #[tokio::test]
    async fn cancelled_context_stops_all_pass() {
        let registry = ProbeRegistry::with_policy(FailurePolicy::Collect);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        registry.register("a", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProbeError>(ProbeResult::new("a")) }
        });

        let token = CancellationToken::new();
        token.cancel();
        let ctx = ProbeContext::new("REQ-1", token);

        let err = registry.dispatch(&ctx, "").await.unwrap_err();

        assert!(matches!(err, ProbeError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_dispatches_see_complete_registry() {
        let registry = Arc::new(ProbeRegistry::new());
        for name in ["alpha", "beta", "gamma"] {
            registry.register(name, fixed(name));
        }

        let mut handles = Vec::new();
        for i in 0..64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let name = ["alpha", "beta", "gamma", "missing", ""][i % 5];
                registry.dispatch(&ProbeContext::detached(), name).await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let out = handle.await.unwrap();
            match i % 5 {
                3 => assert!(matches!(out, Err(ProbeError::NotFound(_)))),
                4 => assert_eq!(names_of(out.unwrap()), vec!["alpha", "beta", "gamma"]),
                _ => assert!(matches!(out, Ok(Dispatch::One(_)))),
            }
        }
    }

    #[test]
    fn names_are_sorted() {
        let registry = ProbeRegistry::new();
        registry.register("zeta", fixed("zeta"));
        registry.register("eta", fixed("eta"));
        assert_eq!(registry.names(), vec!["eta", "zeta"]);
        assert!(!registry.is_empty());
    }
}
