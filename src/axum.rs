//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cache::RoleCache;
use crate::error::Error;
use crate::gate::{Decision, Gate};
use crate::role::Role;
use crate::types::AccountId;

use ::axum::body::Body;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};

/// Authenticated caller, inserted into request extensions by an upstream
/// authentication layer.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Account the request acts as.
    pub account: AccountId,
}

impl AuthContext {
    pub fn new(account: AccountId) -> Self {
        Self { account }
    }
}

/// Middleware layer that lets a request through only when the caller holds a
/// role.
#[derive(Debug)]
pub struct RequireRoleLayer<C> {
    gate: Gate<C>,
    role: Role,
}

impl<C> Clone for RequireRoleLayer<C> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            role: self.role.clone(),
        }
    }
}

impl<C: RoleCache> RequireRoleLayer<C> {
    /// Creates a layer requiring `role`.
    pub fn new(gate: Gate<C>, role: Role) -> Self {
        Self { gate, role }
    }

    /// Creates a layer requiring the administrator role.
    pub fn admin(gate: Gate<C>) -> Self {
        Self::new(gate, Role::admin())
    }
}

impl<C, Inner> Layer<Inner> for RequireRoleLayer<C>
where
    C: RoleCache,
{
    type Service = RequireRoleService<Inner, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RequireRoleService {
            inner,
            gate: self.gate.clone(),
            role: self.role.clone(),
        }
    }
}

/// Middleware service that enforces role checks.
#[derive(Debug)]
pub struct RequireRoleService<Inner, C> {
    inner: Inner,
    gate: Gate<C>,
    role: Role,
}

impl<Inner: Clone, C> Clone for RequireRoleService<Inner, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
            role: self.role.clone(),
        }
    }
}

impl<Inner, C> Service<Request<Body>> for RequireRoleService<Inner, C>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    C: RoleCache + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let gate = self.gate.clone();
        let role = self.role.clone();

        Box::pin(async move {
            let context = req.extensions().get::<AuthContext>().cloned();
            let Some(context) = context else {
                return Ok((StatusCode::UNAUTHORIZED, "missing auth context").into_response());
            };

            match gate.check(&context.account, &role) {
                Ok(Decision::Allow) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(Decision::Deny) => Ok((StatusCode::FORBIDDEN, "forbidden").into_response()),
                Err(Error::UnknownAccount { .. }) => {
                    Ok((StatusCode::UNAUTHORIZED, "unknown account").into_response())
                }
                Err(_) => Ok((StatusCode::INTERNAL_SERVER_ERROR, "auth error").into_response()),
            }
        })
    }
}
