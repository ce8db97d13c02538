//! The definition graph and the container built from it.
//!
//! A [`Graph`] collects one build function per instance name. [`Graph::build`]
//! freezes it into a [`Container`], which builds instances lazily on
//! [`Container::get`], memoizes them, and supervises the ones that are
//! [`Runnable`](crate::Runnable).
//!
//! A name's build function runs at most once even when many tasks `get` it
//! concurrently: misses take a per-name lock and re-check the cache before
//! building. Failed builds are not cached.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

use crate::context::{CancelSignal, Context};
use crate::error::{BoxError, RuntimeError, TaskError};
use crate::instance::Instance;
use crate::tasks::{self, ShutdownReport};

/// Builds one instance, getting its dependencies from the container.
pub type BuildFn = Arc<dyn Fn(&Container) -> Result<Instance, BoxError> + Send + Sync>;

/// Instance definitions, before any are built.
#[derive(Default)]
pub struct Graph {
    build_fns: HashMap<String, BuildFn>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Registers the build function for `name`, replacing any earlier one.
    pub fn define<F>(&mut self, name: &str, build: F)
    where
        F: Fn(&Container) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        if self
            .build_fns
            .insert(name.to_string(), Arc::new(build))
            .is_some()
        {
            tracing::warn!(name = %name, "redefined instance");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.build_fns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.build_fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.build_fns.is_empty()
    }

    /// Freezes the definitions into a container whose tasks run on the
    /// current tokio runtime.
    pub fn build(self) -> Result<Container, RuntimeError> {
        let handle = Handle::try_current().map_err(|e| RuntimeError::NoRuntime(e.to_string()))?;
        Ok(self.build_on(handle))
    }

    /// Like [`Graph::build`], with an explicit runtime.
    pub fn build_on(self, handle: Handle) -> Container {
        tracing::debug!(definitions = self.build_fns.len(), "built container");
        Container {
            inner: Arc::new(Inner {
                build_fns: self.build_fns,
                built: DashMap::new(),
                slots: DashMap::new(),
                signal: CancelSignal::new(),
                tasks: Mutex::new(JoinSet::new()),
                handle,
            }),
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.build_fns.keys().collect();
        names.sort();
        f.debug_struct("Graph").field("definitions", &names).finish()
    }
}

struct Inner {
    build_fns: HashMap<String, BuildFn>,
    built: DashMap<String, Instance>,
    /// Per-name build locks.
    slots: DashMap<String, Arc<Mutex<()>>>,
    signal: CancelSignal,
    tasks: Mutex<JoinSet<(String, Result<(), String>)>>,
    handle: Handle,
}

/// Lazily builds and memoizes instances and supervises background tasks.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// The instance named `name`, building it (and, through its build
    /// function, its dependencies) on first use.
    ///
    /// Runnable instances are spawned before this returns. Blocks while
    /// another task is building the same name.
    pub fn get(&self, name: &str) -> Result<Instance, RuntimeError> {
        if let Some(instance) = self.inner.built.get(name) {
            return Ok(instance.clone());
        }
        let build = self
            .inner
            .build_fns
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound {
                name: name.to_string(),
            })?;

        let _frame = BuildFrame::enter(self.id(), name)?;
        let slot = Arc::clone(self.inner.slots.entry(name.to_string()).or_default().value());
        let _lock = lock(&slot);
        if let Some(instance) = self.inner.built.get(name) {
            return Ok(instance.clone());
        }

        let instance = build(self).map_err(|source| {
            tracing::warn!(name = %name, error = %source, "build failed");
            RuntimeError::Build {
                name: name.to_string(),
                source,
            }
        })?;
        match instance.as_str() {
            Some(value) => {
                tracing::info!(name = %name, ty = instance.type_name(), value = %value, "Built")
            }
            None => tracing::info!(name = %name, ty = instance.type_name(), "Built"),
        }

        if let Some(task) = instance.task() {
            let ctx = self.context();
            self.spawn(name, async move { task.run(ctx).await });
        }
        self.inner.built.insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    /// [`Container::get`] and downcast to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RuntimeError> {
        let instance = self.get(name)?;
        instance
            .downcast::<T>()
            .ok_or_else(|| RuntimeError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
                actual: instance.type_name(),
            })
    }

    pub fn is_built(&self, name: &str) -> bool {
        self.inner.built.contains_key(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.inner.build_fns.contains_key(name)
    }

    /// A context observing the container's shared cancellation.
    pub fn context(&self) -> Context {
        self.inner.signal.context()
    }

    /// Cancels every supervised task's context.
    pub fn cancel(&self) {
        if self.inner.signal.cancel() {
            tracing::info!("cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.signal.is_cancelled()
    }

    /// Supervises `future` alongside the runnable instances. Its failure
    /// cancels everything, like any other task's.
    pub fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let supervised = tasks::supervise(name.to_string(), future, self.inner.signal.clone());
        lock(&self.inner.tasks).spawn_on(supervised, &self.inner.handle);
    }

    /// Waits for every supervised task to return, including tasks spawned
    /// while waiting, and reports each exactly once.
    pub async fn wait(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        loop {
            let mut set = std::mem::take(&mut *lock(&self.inner.tasks));
            if set.is_empty() {
                break;
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((name, outcome)) => report.record(name, outcome),
                    Err(err) => {
                        tracing::error!(error = %err, "supervisor task lost");
                        report.record("<unknown>".to_string(), Err(err.to_string()));
                    }
                }
            }
        }
        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "all tasks returned"
        );
        report
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.inner.build_fns.len())
            .field("built", &self.inner.built.len())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

thread_local! {
    /// Names being built on this thread, outermost first, tagged with their
    /// container.
    static BUILDING: RefCell<Vec<(usize, String)>> = RefCell::new(Vec::new());
}

/// Marks `name` as being built on this thread until dropped.
struct BuildFrame;

impl BuildFrame {
    fn enter(container: usize, name: &str) -> Result<Self, RuntimeError> {
        BUILDING.with(|stack| {
            let mut stack = stack.borrow_mut();
            let start = stack
                .iter()
                .position(|(owner, building)| *owner == container && building == name);
            if let Some(start) = start {
                let mut chain: Vec<&str> = stack[start..]
                    .iter()
                    .filter(|(owner, _)| *owner == container)
                    .map(|(_, building)| building.as_str())
                    .collect();
                chain.push(name);
                return Err(RuntimeError::CyclicDependency {
                    name: name.to_string(),
                    chain: chain.join(" -> "),
                });
            }
            stack.push((container, name.to_string()));
            Ok(BuildFrame)
        })
    }
}

impl Drop for BuildFrame {
    fn drop(&mut self) {
        BUILDING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(graph: &mut Graph, name: &str, value: &str) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let value = value.to_string();
        graph.define(name, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new(value.clone()))
        });
        calls
    }

    #[tokio::test]
    async fn get_memoizes() {
        let mut graph = Graph::new();
        let calls = counting(&mut graph, "greeting", "hello");
        let ctr = graph.build().unwrap();

        assert!(!ctr.is_built("greeting"));
        let a = ctr.get("greeting").unwrap();
        let b = ctr.get("greeting").unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(ctr.is_built("greeting"));
        assert_eq!(a.as_str(), Some("hello"));
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let ctr = Graph::new().build().unwrap();
        let err = ctr.get("missing").unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound { ref name } if name == "missing"));
        assert!(!ctr.is_built("missing"));
    }

    #[tokio::test]
    async fn failed_builds_are_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let mut graph = Graph::new();
        graph.define("flaky", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("not yet".into())
            } else {
                Ok(Instance::new(7u32))
            }
        });
        let ctr = graph.build().unwrap();

        assert!(matches!(ctr.get("flaky"), Err(RuntimeError::Build { .. })));
        assert!(!ctr.is_built("flaky"));
        assert_eq!(*ctr.get_as::<u32>("flaky").unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dependencies_are_built_through_the_container() {
        let mut graph = Graph::new();
        let calls = counting(&mut graph, "greeting", "hello");
        graph.define("frontend.users", |ctr| {
            let greeting = ctr.get_as::<String>("greeting")?;
            Ok(Instance::new(format!("{greeting} users")))
        });
        let ctr = graph.build().unwrap();

        let users = ctr.get("frontend.users").unwrap();
        assert_eq!(users.as_str(), Some("hello users"));
        assert!(ctr.is_built("greeting"));
        ctr.get("greeting").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn self_dependency_is_a_cycle() {
        let mut graph = Graph::new();
        graph.define("a", |ctr| {
            ctr.get("b")?;
            Ok(Instance::new(()))
        });
        graph.define("b", |ctr| {
            ctr.get("a")?;
            Ok(Instance::new(()))
        });
        let ctr = graph.build().unwrap();

        let err = ctr.get("a").unwrap_err();
        let RuntimeError::Build { source, .. } = err else {
            panic!("expected a build error");
        };
        let inner = source.to_string();
        assert!(inner.contains("a -> b -> a"), "{inner}");
        assert!(!ctr.is_built("a"));
        assert!(!ctr.is_built("b"));
    }

    #[tokio::test]
    async fn wrong_type_is_a_mismatch() {
        let mut graph = Graph::new();
        counting(&mut graph, "greeting", "hello");
        let ctr = graph.build().unwrap();

        let err = ctr.get_as::<u64>("greeting").unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { expected: "u64", .. }));
    }

    #[tokio::test]
    async fn redefining_replaces() {
        let mut graph = Graph::new();
        counting(&mut graph, "x", "first");
        counting(&mut graph, "x", "second");
        assert_eq!(graph.len(), 1);
        let ctr = graph.build().unwrap();
        assert_eq!(ctr.get("x").unwrap().as_str(), Some("second"));
    }

    #[test]
    fn build_outside_runtime_fails() {
        let err = Graph::new().build().unwrap_err();
        assert!(matches!(err, RuntimeError::NoRuntime(_)));
    }

    #[test]
    fn build_on_explicit_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let ctr = Graph::new().build_on(rt.handle().clone());
        ctr.spawn("noop", async { Ok::<(), TaskError>(()) });
        let report = rt.block_on(ctr.wait());
        assert_eq!(report.completed, vec!["noop"]);
    }

    #[tokio::test]
    async fn wait_with_no_tasks_returns_empty_report() {
        let ctr = Graph::new().build().unwrap();
        assert_eq!(ctr.wait().await.total(), 0);
    }
}
