//! Invocation engine: a base call wrapped by explicit decorator layers.
//!
//! Cross-cutting behavior is composed, not intercepted: [`BoundCall`] invokes
//! the descriptor's callable, [`CacheLayer`] adds the TTL cache for cacheable
//! descriptors, and [`TraceLayer`] instruments the whole chain. Every layer
//! implements the identical [`CallLayer`] contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::core::FlowValue;
use crate::core::cache::InvocationCache;
use crate::core::coerce::{bind_positional, validate};
use crate::core::descriptor::FunctionDescriptor;
use crate::core::error::FlowError;

/// The invocation contract shared by the base call and every decorator.
pub trait CallLayer: Send + Sync {
    fn call(
        &self,
        descriptor: &FunctionDescriptor,
        args: &[FlowValue],
    ) -> Result<FlowValue, FlowError>;
}

/// Base of the chain: invokes the bound callable and wraps any failure with
/// the descriptor id so the origin is never lost.
struct BoundCall;

impl CallLayer for BoundCall {
    fn call(
        &self,
        descriptor: &FunctionDescriptor,
        args: &[FlowValue],
    ) -> Result<FlowValue, FlowError> {
        descriptor
            .call(args)
            .map_err(|source| FlowError::ExecutionFailed {
                id: descriptor.id.clone(),
                source,
            })
    }
}

/// Caching cross-cut, applied only when the descriptor opts in.
///
/// Failed invocations are never cached, and arguments that cannot be keyed
/// fall back to direct invocation rather than failing the call.
struct CacheLayer {
    inner: Box<dyn CallLayer>,
    cache: Arc<InvocationCache>,
}

impl CallLayer for CacheLayer {
    fn call(
        &self,
        descriptor: &FunctionDescriptor,
        args: &[FlowValue],
    ) -> Result<FlowValue, FlowError> {
        if !descriptor.cacheable {
            return self.inner.call(descriptor, args);
        }

        let Some(key) = InvocationCache::key(&descriptor.id, args) else {
            log::warn!(
                "Arguments for '{}' could not be keyed, invoking directly.",
                descriptor.id
            );
            return self.inner.call(descriptor, args);
        };

        if let Some(hit) = self.cache.get(&key) {
            log::debug!("Cache hit for '{}'", descriptor.id);
            return Ok(hit);
        }

        let result = self.inner.call(descriptor, args)?;
        self.cache.put(key, result.clone(), descriptor.cache_ttl);
        Ok(result)
    }
}

/// Instrumentation layer: records target and elapsed time for every call.
struct TraceLayer {
    inner: Box<dyn CallLayer>,
}

impl CallLayer for TraceLayer {
    fn call(
        &self,
        descriptor: &FunctionDescriptor,
        args: &[FlowValue],
    ) -> Result<FlowValue, FlowError> {
        let started = Instant::now();
        let result = self.inner.call(descriptor, args);
        match &result {
            Ok(_) => log::debug!(
                "Invoked '{}' in {:?}",
                descriptor.id,
                started.elapsed()
            ),
            Err(err) => log::error!(
                "Invocation of '{}' failed after {:?}: {}",
                descriptor.id,
                started.elapsed(),
                err
            ),
        }
        result
    }
}

/// Executes descriptors synchronously or asynchronously, applying validation,
/// optional caching, and timeout.
pub struct Invoker {
    chain: Arc<dyn CallLayer>,
    pool: Arc<Semaphore>,
}

impl Invoker {
    /// Builds the decorator chain over a shared cache and a bounded pool.
    pub fn new(cache: Arc<InvocationCache>, pool: Arc<Semaphore>) -> Self {
        let chain: Arc<dyn CallLayer> = Arc::new(TraceLayer {
            inner: Box::new(CacheLayer {
                inner: Box::new(BoundCall),
                cache,
            }),
        });
        Self { chain, pool }
    }

    /// Validates, coerces into positional order, and runs the layered call on
    /// the current thread.
    pub fn invoke_sync(
        &self,
        descriptor: &FunctionDescriptor,
        raw_args: &HashMap<String, FlowValue>,
    ) -> Result<FlowValue, FlowError> {
        validate(descriptor, raw_args)?;
        let args = bind_positional(descriptor, raw_args)?;
        self.chain.call(descriptor, &args)
    }

    /// Schedules the invocation on the bounded pool and races it against the
    /// descriptor's deadline.
    ///
    /// Refused immediately for descriptors not marked async: nothing is
    /// scheduled. On timeout the task is aborted best-effort; a callable that
    /// is not cooperatively interruptible may still run to completion in the
    /// background.
    pub async fn invoke_async(
        &self,
        descriptor: Arc<FunctionDescriptor>,
        raw_args: HashMap<String, FlowValue>,
    ) -> Result<FlowValue, FlowError> {
        if !descriptor.is_async {
            return Err(FlowError::UnsupportedAsync(descriptor.id.clone()));
        }

        // Backpressure: wait for the bounded pool to accept the task.
        let permit = Arc::clone(&self.pool)
            .acquire_owned()
            .await
            .map_err(|_| FlowError::Terminated)?;

        let chain = Arc::clone(&self.chain);
        let task_descriptor = Arc::clone(&descriptor);
        let mut handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            validate(&task_descriptor, &raw_args)?;
            let args = bind_positional(&task_descriptor, &raw_args)?;
            chain.call(&task_descriptor, &args)
        });

        match tokio::time::timeout(descriptor.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(FlowError::ExecutionFailed {
                id: descriptor.id.clone(),
                source: Box::new(join_error),
            }),
            Err(_) => {
                handle.abort();
                Err(FlowError::Timeout {
                    id: descriptor.id.clone(),
                    timeout_millis: descriptor.timeout.as_millis() as u64,
                })
            }
        }
    }
}
