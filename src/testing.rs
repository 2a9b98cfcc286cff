//! Testing utilities.
//!
//! [`MockModel`] stands in for a remote model so the pipeline can be driven
//! end to end without network calls or API keys.

use crate::error::ServiceError;
use crate::model::{GenerationRequest, GenerativeModel, ModelTask};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Handler = dyn Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync;
type DelayFn = dyn Fn(&GenerationRequest) -> Duration + Send + Sync;

/// Record of a call made to the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub task: ModelTask,
    /// All text parts joined with blank lines.
    pub prompt: String,
    pub media_count: usize,
    pub wants_json: bool,
}

/// A scripted [`GenerativeModel`].
///
/// Every call is answered by the handler closure and recorded for later
/// assertions. An optional delay function lets tests make calls complete
/// out of order.
#[derive(Clone)]
pub struct MockModel {
    handler: Arc<Handler>,
    delay: Option<Arc<DelayFn>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockModel {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that answers every call with the same text.
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Sleep before answering, per request.
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Arc::new(delay));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    /// Calls made for one task.
    pub fn calls_for(&self, task: ModelTask) -> Vec<MockCall> {
        self.lock().iter().filter(|c| c.task == task).cloned().collect()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        self.lock().push(MockCall {
            task: request.task,
            prompt: request.prompt_text(),
            media_count: request.media_parts().count(),
            wants_json: request.wants_json(),
        });

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(request)).await;
        }

        (self.handler)(request)
    }
}
