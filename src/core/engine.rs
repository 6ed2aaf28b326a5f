//! The engine facade: one explicit value owning all shared state, with a
//! construction/shutdown lifecycle. No ambient singletons.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::core::FlowValue;
use crate::core::cache::InvocationCache;
use crate::core::descriptor::FunctionDescriptor;
use crate::core::error::FlowError;
use crate::core::invoker::Invoker;
use crate::core::registry::DescriptorStore;
use crate::core::scheduler::Scheduler;
use crate::core::workflow::WorkflowDefinition;

/// Engine construction knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of concurrently executing asynchronous invocations.
    /// Acquiring a slot past this limit waits (backpressure).
    pub worker_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { worker_limit: 8 }
    }
}

struct EngineInner {
    store: Arc<DescriptorStore>,
    invoker: Arc<Invoker>,
    scheduler: Scheduler,
    pool: Arc<Semaphore>,
}

/// The function-flow engine: registry, invoker, and workflow scheduler behind
/// one handle.
///
/// Cloning is cheap and shares all state; drop every clone or call
/// [`shutdown`](FlowEngine::shutdown) to end the lifecycle. After shutdown,
/// asynchronous execution fails with [`FlowError::Terminated`]; synchronous
/// calls on live handles still complete.
#[derive(Clone)]
pub struct FlowEngine {
    inner: Arc<EngineInner>,
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(DescriptorStore::new());
        let cache = Arc::new(InvocationCache::new());
        let pool = Arc::new(Semaphore::new(config.worker_limit.max(1)));
        let invoker = Arc::new(Invoker::new(cache, Arc::clone(&pool)));
        let scheduler = Scheduler::new(Arc::clone(&store), Arc::clone(&invoker));
        Self {
            inner: Arc::new(EngineInner {
                store,
                invoker,
                scheduler,
                pool,
            }),
        }
    }

    /// Registers a descriptor delivered by a discovery collaborator.
    pub fn register_function(&self, descriptor: FunctionDescriptor) -> Arc<FunctionDescriptor> {
        self.inner.store.register(descriptor)
    }

    /// Snapshot of all registered descriptors.
    pub fn functions(&self) -> Vec<Arc<FunctionDescriptor>> {
        self.inner.store.list()
    }

    pub fn lookup_function(&self, id: &str) -> Option<Arc<FunctionDescriptor>> {
        self.inner.store.lookup(id)
    }

    /// Validates, coerces, and invokes a registered function synchronously.
    pub fn execute_function(
        &self,
        id: &str,
        args: HashMap<String, FlowValue>,
    ) -> Result<FlowValue, FlowError> {
        let descriptor = self
            .inner
            .store
            .lookup(id)
            .ok_or_else(|| FlowError::FunctionNotFound(id.to_string()))?;
        self.inner.invoker.invoke_sync(&descriptor, &args)
    }

    /// Schedules an async-capable function on the bounded pool, honoring its
    /// declared timeout.
    pub async fn execute_function_async(
        &self,
        id: &str,
        args: HashMap<String, FlowValue>,
    ) -> Result<FlowValue, FlowError> {
        let descriptor = self
            .inner
            .store
            .lookup(id)
            .ok_or_else(|| FlowError::FunctionNotFound(id.to_string()))?;
        self.inner.invoker.invoke_async(descriptor, args).await
    }

    pub fn register_workflow(&self, workflow: WorkflowDefinition) -> Result<(), FlowError> {
        self.inner.scheduler.register(workflow)
    }

    pub fn lookup_workflow(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.inner.scheduler.lookup(id)
    }

    /// Runs a workflow to completion on the calling thread.
    pub fn execute_workflow(
        &self,
        id: &str,
        inputs: HashMap<String, FlowValue>,
    ) -> Result<HashMap<String, FlowValue>, FlowError> {
        self.inner.scheduler.run(id, inputs)
    }

    /// Relocates one blocking workflow run onto the pool. The DAG itself is
    /// still executed one node at a time.
    pub async fn execute_workflow_async(
        &self,
        id: &str,
        inputs: HashMap<String, FlowValue>,
    ) -> Result<HashMap<String, FlowValue>, FlowError> {
        let permit = Arc::clone(&self.inner.pool)
            .acquire_owned()
            .await
            .map_err(|_| FlowError::Terminated)?;

        let engine = self.clone();
        let workflow_id = id.to_string();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            engine.execute_workflow(&workflow_id, inputs)
        });

        handle.await.map_err(|join_error| FlowError::ExecutionFailed {
            id: id.to_string(),
            source: Box::new(join_error),
        })?
    }

    /// Ends the lifecycle: pending pool waiters and all subsequent async
    /// executions fail with [`FlowError::Terminated`].
    pub fn shutdown(&self) {
        log::info!("Engine shutting down; closing the worker pool.");
        self.inner.pool.close();
    }
}
