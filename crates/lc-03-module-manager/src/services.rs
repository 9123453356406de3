//! # Message and Query Routing
//!
//! Modules register their handlers into a `Configurator` once, at build
//! time. A message is routed by its `type_url`; a query path is routed by its
//! first segment (`bank/balance` goes to the `bank` query handler with
//! sub-path `balance`).

use std::collections::BTreeMap;
use std::sync::Arc;

use lc_01_state_store::Context;
use shared_types::{ConfigError, Msg, TxError, TxErrorKind};
use tracing::debug;

pub trait MsgHandler: Send + Sync {
    fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<(), TxError>;
}

pub trait QueryHandler: Send + Sync {
    /// `path` is the remainder after the module route; `data` is JSON.
    fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError>;
}

#[derive(Clone, Default)]
pub struct MsgServiceRouter {
    routes: BTreeMap<String, (String, Arc<dyn MsgHandler>)>,
}

impl MsgServiceRouter {
    pub fn register(
        &mut self,
        module: &str,
        type_url: &str,
        handler: Arc<dyn MsgHandler>,
    ) -> Result<(), ConfigError> {
        if self.routes.contains_key(type_url) {
            return Err(ConfigError::DuplicateMsgRoute(type_url.to_string()));
        }
        debug!("[Manager] Route {} -> {}", type_url, module);
        self.routes
            .insert(type_url.to_string(), (module.to_string(), handler));
        Ok(())
    }

    #[must_use]
    pub fn has_route(&self, type_url: &str) -> bool {
        self.routes.contains_key(type_url)
    }

    /// Module owning `type_url`.
    #[must_use]
    pub fn module_of(&self, type_url: &str) -> Option<&str> {
        self.routes.get(type_url).map(|(m, _)| m.as_str())
    }

    pub fn dispatch(&self, ctx: &mut Context, msg: &Msg) -> Result<(), TxError> {
        let (_, handler) = self.routes.get(&msg.type_url).ok_or_else(|| {
            TxError::new(
                TxErrorKind::UnknownRequest,
                format!("unrecognized message type {}", msg.type_url),
            )
        })?;
        handler.handle(ctx, msg)
    }

    #[must_use]
    pub fn type_urls(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }
}

#[derive(Clone, Default)]
pub struct QueryRouter {
    routes: BTreeMap<String, Arc<dyn QueryHandler>>,
}

impl QueryRouter {
    pub fn register(&mut self, route: &str, handler: Arc<dyn QueryHandler>) -> Result<(), ConfigError> {
        if self.routes.contains_key(route) {
            return Err(ConfigError::DuplicateQueryRoute(route.to_string()));
        }
        self.routes.insert(route.to_string(), handler);
        Ok(())
    }

    pub fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError> {
        let path = path.trim_start_matches('/');
        let (route, rest) = path.split_once('/').unwrap_or((path, ""));
        let handler = self.routes.get(route).ok_or_else(|| {
            TxError::new(
                TxErrorKind::UnknownRequest,
                format!("unknown query route {route}"),
            )
        })?;
        handler.query(ctx, rest, data)
    }
}

/// Collects every module's services during build.
#[derive(Clone, Default)]
pub struct Configurator {
    msg_router: MsgServiceRouter,
    query_router: QueryRouter,
}

impl Configurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_msg(
        &mut self,
        module: &str,
        type_url: &str,
        handler: Arc<dyn MsgHandler>,
    ) -> Result<(), ConfigError> {
        self.msg_router.register(module, type_url, handler)
    }

    pub fn register_query(&mut self, route: &str, handler: Arc<dyn QueryHandler>) -> Result<(), ConfigError> {
        self.query_router.register(route, handler)
    }

    #[must_use]
    pub fn msg_router(&self) -> &MsgServiceRouter {
        &self.msg_router
    }

    #[must_use]
    pub fn query_router(&self) -> &QueryRouter {
        &self.query_router
    }

    pub fn into_routers(self) -> (MsgServiceRouter, QueryRouter) {
        (self.msg_router, self.query_router)
    }
}
