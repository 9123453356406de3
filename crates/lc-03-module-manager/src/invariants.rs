//! Invariant routes registered by modules and asserted by crisis.
//!
//! A route is `module/name`. A check returns `Err(detail)` when the invariant
//! is broken.

use std::fmt;
use std::sync::Arc;

use lc_01_state_store::Context;
use shared_types::ConfigError;
use tracing::{debug, error};

pub type InvariantFn = Arc<dyn Fn(&mut Context) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub struct InvariantRoute {
    pub module: String,
    pub name: String,
    check: InvariantFn,
}

impl InvariantRoute {
    #[must_use]
    pub fn full_route(&self) -> String {
        format!("{}/{}", self.module, self.name)
    }

    pub fn check(&self, ctx: &mut Context) -> Result<(), String> {
        (self.check)(ctx)
    }
}

impl fmt::Debug for InvariantRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvariantRoute({})", self.full_route())
    }
}

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantBreak {
    pub route: String,
    pub detail: String,
}

/// Ordered set of invariant routes. Order is registration order.
#[derive(Debug, Clone, Default)]
pub struct InvariantRegistry {
    routes: Vec<InvariantRoute>,
}

impl InvariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_route<F>(&mut self, module: &str, name: &str, check: F) -> Result<(), ConfigError>
    where
        F: Fn(&mut Context) -> Result<(), String> + Send + Sync + 'static,
    {
        if self
            .routes
            .iter()
            .any(|r| r.module == module && r.name == name)
        {
            return Err(ConfigError::Invalid(format!(
                "invariant route {module}/{name} registered twice"
            )));
        }
        self.routes.push(InvariantRoute {
            module: module.to_string(),
            name: name.to_string(),
            check: Arc::new(check),
        });
        Ok(())
    }

    #[must_use]
    pub fn routes(&self) -> &[InvariantRoute] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Run every route; the first broken one is returned.
    pub fn assert_all(&self, ctx: &mut Context) -> Result<(), InvariantBreak> {
        for route in &self.routes {
            if let Err(detail) = route.check(ctx) {
                error!("[Crisis] Invariant {} broken: {}", route.full_route(), detail);
                return Err(InvariantBreak {
                    route: route.full_route(),
                    detail,
                });
            }
        }
        debug!("[Crisis] Asserted {} invariant(s)", self.routes.len());
        Ok(())
    }

    /// Run one route by its full name. `None` if no such route.
    pub fn check_route(&self, ctx: &mut Context, full_route: &str) -> Option<Result<(), String>> {
        self.routes
            .iter()
            .find(|r| r.full_route() == full_route)
            .map(|r| r.check(ctx))
    }
}
