//! Axum integration utilities.
//!
//! [`AuthorizeLayer`] guards a route with a fixed `(resource, action)` pair.
//! The authenticated user is read from an [`AuthContext`] request extension,
//! which an upstream authentication layer is expected to insert.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::engine::{Decision, Engine, Request};
use crate::error::Error;
use crate::store::{PolicyStore, RoleStore};
use crate::types::{ActionId, ResourceId, UserId};

use ::axum::body::Body;
use ::axum::response::{IntoResponse, Response};
use ::http::{Request as HttpRequest, StatusCode};
use ::tower::{Layer, Service};

/// Identity of the caller, established before authorization.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User identifier.
    pub user: UserId,
}

impl AuthContext {
    /// Creates a context for an authenticated user.
    pub fn new(user: UserId) -> Self {
        Self { user }
    }
}

/// Returns the HTTP status a boundary should use for `error`.
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::NotAssigned { .. } | Error::PolicyNotFound(_) => StatusCode::NOT_FOUND,
        Error::PolicyNeverStored | Error::InvalidId(_) => StatusCode::BAD_REQUEST,
        Error::CorruptedIndex { .. } | Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (status_for(&self), self.to_string()).into_response()
    }
}

/// Middleware layer that authorizes a request using [`Engine`].
#[derive(Debug)]
pub struct AuthorizeLayer<R, P> {
    engine: Arc<Engine<R, P>>,
    resource: ResourceId,
    action: ActionId,
}

impl<R, P> Clone for AuthorizeLayer<R, P> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
        }
    }
}

impl<R, P> AuthorizeLayer<R, P> {
    /// Creates a new authorization layer for one resource and action.
    pub fn new(engine: Arc<Engine<R, P>>, resource: ResourceId, action: ActionId) -> Self {
        Self {
            engine,
            resource,
            action,
        }
    }
}

impl<R, P, Inner> Layer<Inner> for AuthorizeLayer<R, P>
where
    R: RoleStore,
    P: PolicyStore,
{
    type Service = AuthorizeService<Inner, R, P>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AuthorizeService {
            inner,
            engine: self.engine.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
        }
    }
}

/// Middleware service that enforces an authorization decision.
#[derive(Debug)]
pub struct AuthorizeService<Inner, R, P> {
    inner: Inner,
    engine: Arc<Engine<R, P>>,
    resource: ResourceId,
    action: ActionId,
}

impl<Inner: Clone, R, P> Clone for AuthorizeService<Inner, R, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            engine: self.engine.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
        }
    }
}

impl<Inner, R, P> Service<HttpRequest<Body>> for AuthorizeService<Inner, R, P>
where
    Inner: Service<HttpRequest<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    R: RoleStore + 'static,
    P: PolicyStore + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HttpRequest<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let engine = self.engine.clone();
        let resource = self.resource.clone();
        let action = self.action.clone();

        Box::pin(async move {
            let Some(context) = req.extensions().get::<AuthContext>().cloned() else {
                return Ok((StatusCode::UNAUTHORIZED, "missing auth context").into_response());
            };

            let request = Request::new(context.user, resource, action);
            match engine.decide(&request).await {
                Ok(Decision::Allow) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(Decision::Deny) => Ok((StatusCode::FORBIDDEN, "forbidden").into_response()),
                Err(error) => {
                    tracing::error!(%error, "authorization error");
                    Ok((StatusCode::INTERNAL_SERVER_ERROR, "auth error").into_response())
                }
            }
        })
    }
}
