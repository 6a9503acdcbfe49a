//! Dispatch seam and the two invocation styles.
//!
//! Every remote operation returns an [`ApiCall`]. It is consumed exactly once,
//! either by awaiting it (deferred style) or by [`ApiCall::with_callbacks`]
//! (success / fail / complete handlers run on a spawned tokio task).

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{ApiError, CloudError};
use crate::request::{Action, Envelope};

pub type ApiFuture<T> = Pin<Box<dyn Future<Output = Result<T, CloudError>> + Send + 'static>>;

/// Sends envelopes to the remote service. Implementations report remote
/// rejections as [`CloudError::Remote`] with the service's message untouched.
pub trait Transport: Send + Sync {
    fn send(&self, envelope: Envelope) -> ApiFuture<Value>;
}

/// A pending remote call.
#[must_use = "an ApiCall does nothing until awaited or given callbacks"]
pub struct ApiCall<T> {
    action: Action,
    future: ApiFuture<T>,
}

impl<T> std::fmt::Debug for ApiCall<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCall").field("action", &self.action).finish_non_exhaustive()
    }
}

impl<T> ApiCall<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Send `envelope` once the call is driven and decode the reply as `T`.
    /// A construction error is delivered through the call's failure channel
    /// instead of being sent. Nothing is logged to the audit target until the
    /// call is actually driven.
    pub(crate) fn dispatch(
        transport: &Arc<dyn Transport>,
        action: Action,
        envelope: Result<Envelope, CloudError>,
    ) -> Self {
        let envelope = match envelope {
            Ok(e) => e,
            Err(e) => {
                log::warn!("{action} rejected before dispatch: {e}");
                return Self::failed(action, e);
            }
        };
        let transport = Arc::clone(transport);
        let future = Box::pin(async move {
            log::debug!("dispatch action={action} request_id={}", envelope.request_id);
            log::info!(
                target: "cloudlite::audit",
                "action={action} env={} request_id={}",
                envelope.env.as_deref().unwrap_or("-"),
                envelope.request_id
            );
            let value = transport.send(envelope).await?;
            Ok(serde_json::from_value::<T>(value)?)
        });
        Self { action, future }
    }

    pub(crate) fn failed(action: Action, err: CloudError) -> Self {
        Self { action, future: Box::pin(async move { Err(err) }) }
    }
}

impl<T> ApiCall<T> {
    pub fn action(&self) -> &'static str {
        self.action.as_str()
    }
}

impl<T: Send + 'static> IntoFuture for ApiCall<T> {
    type Output = Result<T, CloudError>;
    type IntoFuture = ApiFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type FailFn = Box<dyn FnOnce(ApiError) + Send>;
type CompleteFn<T> = Box<dyn FnOnce(Completion<T>) + Send>;

/// Outcome handed to a `complete` handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    Success(T),
    Fail(ApiError),
}

/// The success / fail / complete handler triple. At least one must be set.
pub struct Callbacks<T> {
    success: Option<SuccessFn<T>>,
    fail: Option<FailFn>,
    complete: Option<CompleteFn<T>>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self { success: None, fail: None, complete: None }
    }
}

impl<T> Callbacks<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn success(mut self, f: impl FnOnce(T) + Send + 'static) -> Self {
        self.success = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn fail(mut self, f: impl FnOnce(ApiError) + Send + 'static) -> Self {
        self.fail = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn complete(mut self, f: impl FnOnce(Completion<T>) + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.fail.is_none() && self.complete.is_none()
    }
}

impl<T> ApiCall<T>
where
    T: Clone + Send + 'static,
{
    /// Run the call on the current tokio runtime and report through `callbacks`:
    /// `success` or `fail` first, then `complete`.
    pub fn with_callbacks(
        self,
        callbacks: Callbacks<T>,
    ) -> Result<tokio::task::JoinHandle<()>, CloudError> {
        if callbacks.is_empty() {
            return Err(CloudError::invalid(format!(
                "{}: no success, fail or complete handler given; await the call instead",
                self.action
            )));
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| CloudError::Runtime(e.to_string()))?;
        let Callbacks { success, fail, complete } = callbacks;
        let future = self.future;
        Ok(handle.spawn(async move {
            match future.await {
                Ok(value) => {
                    match (success, complete) {
                        (Some(s), Some(c)) => {
                            s(value.clone());
                            c(Completion::Success(value));
                        }
                        (Some(s), None) => s(value),
                        (None, Some(c)) => c(Completion::Success(value)),
                        (None, None) => {}
                    }
                }
                Err(e) => {
                    let err = e.into_api_error();
                    if let Some(f) = fail {
                        f(err.clone());
                    }
                    if let Some(c) = complete {
                        c(Completion::Fail(err));
                    }
                }
            }
        }))
    }
}

type Responder = dyn Fn(&Envelope) -> Result<Value, CloudError> + Send + Sync;

/// In-memory transport that records every envelope and answers through a
/// caller-supplied responder. Used for tests and dry runs.
pub struct RecordingTransport {
    sent: Mutex<Vec<Envelope>>,
    responder: Box<Responder>,
}

impl RecordingTransport {
    pub fn new(
        responder: impl Fn(&Envelope) -> Result<Value, CloudError> + Send + Sync + 'static,
    ) -> Self {
        Self { sent: Mutex::new(Vec::new()), responder: Box::new(responder) }
    }

    /// Answer every request with `value`.
    pub fn replying(value: Value) -> Self {
        Self::new(move |_| Ok(value.clone()))
    }

    /// Reject every request with `err_msg`.
    pub fn rejecting(err_msg: impl Into<String>) -> Self {
        let err_msg = err_msg.into();
        Self::new(move |_| Err(CloudError::Remote(ApiError::new(err_msg.clone()))))
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }

    pub fn last(&self) -> Option<Envelope> {
        self.sent.lock().last().cloned()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, envelope: Envelope) -> ApiFuture<Value> {
        let reply = (self.responder)(&envelope);
        self.sent.lock().push(envelope);
        Box::pin(async move { reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{CountResult, Request};
    use serde_json::json;

    fn count_envelope() -> Envelope {
        let request = Request::CountDocument { collection: "c".into(), condition: None };
        Envelope::new(request, None, false)
    }

    fn count_call(t: &Arc<dyn Transport>) -> ApiCall<CountResult> {
        ApiCall::dispatch(t, Action::CountDocument, Ok(count_envelope()))
    }

    #[tokio::test]
    async fn deferred_style_decodes_reply() {
        let t: Arc<dyn Transport> = Arc::new(RecordingTransport::replying(json!({"total": 4})));
        let r = count_call(&t).await.unwrap();
        assert_eq!(r.total, 4);
    }

    #[tokio::test]
    async fn callbacks_run_fail_then_complete() {
        let t: Arc<dyn Transport> =
            Arc::new(RecordingTransport::rejecting("-502005 collection not exists"));
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let (s1, s2) = (seen.clone(), seen.clone());
        let call = count_call(&t);
        call.with_callbacks(
            Callbacks::new()
                .success(|_| panic!("unexpected success"))
                .fail(move |e| s1.lock().push(format!("fail:{}", e.err_msg)))
                .complete(move |c| {
                    s2.lock().push(format!("complete:{}", matches!(c, Completion::Fail(_))))
                }),
        )
        .unwrap()
        .await
        .unwrap();
        assert_eq!(*seen.lock(), vec!["fail:-502005 collection not exists", "complete:true"]);
    }

    #[tokio::test]
    async fn empty_callbacks_are_rejected() {
        let t: Arc<dyn Transport> = Arc::new(RecordingTransport::replying(json!({"total": 0})));
        let call = count_call(&t);
        let r = call.with_callbacks(Callbacks::new());
        assert!(matches!(r, Err(CloudError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn rejected_call_keeps_its_action() {
        let t: Arc<dyn Transport> = Arc::new(RecordingTransport::replying(json!({"total": 0})));
        let call: ApiCall<CountResult> =
            ApiCall::dispatch(&t, Action::CountDocument, Err(CloudError::invalid("bad")));
        assert_eq!(call.action(), "database.countDocument");
        assert!(matches!(call.await, Err(CloudError::InvalidArgument(_))));
    }

    #[test]
    fn callbacks_outside_runtime_fail() {
        let call: ApiCall<CountResult> =
            ApiCall::failed(Action::CountDocument, CloudError::invalid("x"));
        let r = call.with_callbacks(Callbacks::new().complete(|_| {}));
        assert!(matches!(r, Err(CloudError::Runtime(_))));
    }
}
