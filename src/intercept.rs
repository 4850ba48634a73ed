//! Interceptor chain around a request dispatcher
//!
//! Wraps an arbitrary dispatcher with optional pre- and post-processing
//! hooks. On every request the pre hook runs to completion, the inner
//! dispatcher handles the request, then the post hook runs - strictly in
//! this order on the same invocation. The wrapped value is itself a tower
//! `Service`, so chains compose recursively.
//!
//! The chain raises no errors of its own; hook failures are the hook's
//! responsibility.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{extract::Request, response::Response, Router};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

/// Hook running before dispatch, borrowing the request
pub type PreHook = Arc<dyn for<'a> Fn(&'a Request) -> BoxFuture<'a, ()> + Send + Sync>;

/// Hook running after dispatch, borrowing the response
pub type PostHook = Arc<dyn for<'a> Fn(&'a Response) -> BoxFuture<'a, ()> + Send + Sync>;

/// Wrap a dispatcher with optional pre/post hooks.
///
/// If `dispatcher` is `None` an empty router is substituted, so unmatched
/// requests fail with a not-found response instead of crashing the chain.
pub fn compose(dispatcher: Option<Router>, pre: Option<PreHook>, post: Option<PostHook>) -> Router {
    dispatcher
        .unwrap_or_default()
        .layer(InterceptLayer::new(pre, post))
}

/// Tower layer producing [`Intercept`] services
#[derive(Clone)]
pub struct InterceptLayer {
    pre: Option<PreHook>,
    post: Option<PostHook>,
}

impl InterceptLayer {
    pub fn new(pre: Option<PreHook>, post: Option<PostHook>) -> Self {
        Self { pre, post }
    }
}

impl<S> Layer<S> for InterceptLayer {
    type Service = Intercept<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Intercept {
            inner,
            pre: self.pre.clone(),
            post: self.post.clone(),
        }
    }
}

/// Service running pre hook, inner dispatch, post hook in strict order
#[derive(Clone)]
pub struct Intercept<S> {
    inner: S,
    pre: Option<PreHook>,
    post: Option<PostHook>,
}

impl<S> Service<Request> for Intercept<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Take the service that was polled ready, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let pre = self.pre.clone();
        let post = self.post.clone();

        Box::pin(async move {
            if let Some(pre) = &pre {
                pre(&req).await;
            }
            let resp = inner.call(req).await?;
            if let Some(post) = &post {
                post(&resp).await;
            }
            Ok(resp)
        })
    }
}
