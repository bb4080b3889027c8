//! Route handlers.
//!
//! A handler is either a plain function (closure) or a `Controller.method`
//! reference resolved through a [`ControllerResolver`] when the route is hit.
//! Which form a route uses is decided once at registration; calling it is a
//! single match on [`HandlerRef`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use tracing::debug;

use crate::context::{Body, RequestContext};
use crate::error::HttpError;

/// What a handler returns: an optional body, or a request-time error.
///
/// A returned body is only used when the handler did not already write one
/// to the response.
pub type HandlerResult = Result<Option<Body>, HttpError>;

pub type HandlerFn = dyn Fn(&mut RequestContext) -> HandlerResult + Send + Sync;

/// A controller exposing named methods.
pub trait Controller: Send + Sync {
    fn call(&self, method: &str, ctx: &mut RequestContext) -> HandlerResult;
}

/// Looks up a controller instance by name for each call.
pub trait ControllerResolver: Send + Sync {
    fn resolve(&self, controller: &str) -> Result<Arc<dyn Controller>, HttpError>;
}

/// Handler reference stored on a route.
#[derive(Clone)]
pub enum HandlerRef {
    Function(Arc<HandlerFn>),
    ControllerMethod {
        resolver: Arc<dyn ControllerResolver>,
        controller: Arc<str>,
        method: Arc<str>,
    },
}

impl HandlerRef {
    pub fn function<F>(handler: F) -> Self
    where
        F: Fn(&mut RequestContext) -> HandlerResult + Send + Sync + 'static,
    {
        HandlerRef::Function(Arc::new(handler))
    }

    pub fn controller(
        resolver: Arc<dyn ControllerResolver>,
        controller: &str,
        method: &str,
    ) -> Self {
        HandlerRef::ControllerMethod {
            resolver,
            controller: Arc::from(controller),
            method: Arc::from(method),
        }
    }

    /// `Controller.method` for controller handlers.
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        match self {
            HandlerRef::Function(_) => None,
            HandlerRef::ControllerMethod {
                controller, method, ..
            } => Some(format!("{controller}.{method}")),
        }
    }

    /// Whether `identifier` equals this handler's `Controller.method`.
    #[must_use]
    pub fn matches_identity(&self, identifier: &str) -> bool {
        match self {
            HandlerRef::Function(_) => false,
            HandlerRef::ControllerMethod {
                controller, method, ..
            } => identifier
                .strip_prefix(controller.as_ref())
                .and_then(|rest| rest.strip_prefix('.'))
                == Some(method.as_ref()),
        }
    }

    #[inline]
    pub fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        match self {
            HandlerRef::Function(handler) => handler(ctx),
            HandlerRef::ControllerMethod {
                resolver,
                controller,
                method,
            } => {
                let instance = resolver.resolve(controller)?;
                instance.call(method, ctx)
            }
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Function(_) => f.write_str("HandlerRef::Function"),
            HandlerRef::ControllerMethod {
                controller, method, ..
            } => write!(f, "HandlerRef::ControllerMethod({controller}.{method})"),
        }
    }
}

/// In-memory [`ControllerResolver`] keyed by controller name.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: RwLock<HashMap<String, Arc<dyn Controller>>>,
}

impl ControllerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a controller.
    pub fn register<C>(&self, name: &str, controller: C)
    where
        C: Controller + 'static,
    {
        match self.controllers.write() {
            Ok(mut map) => {
                map.insert(name.to_string(), Arc::new(controller));
                debug!(controller = %name, "Controller registered");
            }
            Err(poisoned) => {
                poisoned
                    .into_inner()
                    .insert(name.to_string(), Arc::new(controller));
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.controllers.read().map(|m| m.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ControllerResolver for ControllerRegistry {
    fn resolve(&self, controller: &str) -> Result<Arc<dyn Controller>, HttpError> {
        let map = self
            .controllers
            .read()
            .map_err(|_| HttpError::internal(anyhow!("controller registry lock poisoned")))?;
        map.get(controller)
            .map(Arc::clone)
            .ok_or_else(|| HttpError::internal(anyhow!("controller \"{controller}\" is not registered")))
    }
}
