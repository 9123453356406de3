//! # Params
//!
//! Read access to every module's parameter subspace. The subspaces
//! themselves are created by the application while it builds keepers; this
//! module only serves `params/<subspace>` queries.

use std::sync::Arc;

use lc_01_state_store::{Context, ParamsKeeper};
use lc_03_module_manager::{Configurator, ModuleDescriptor, QueryHandler, ServiceRegistrar};
use shared_types::{ConfigError, TxError, TxErrorKind};

use crate::encode_response;

pub const MODULE_NAME: &str = "params";
pub const STORE_KEY: &str = "params";
pub const TRANSIENT_KEY: &str = "transient_params";
pub const CONSENSUS_VERSION: u64 = 1;

pub struct ParamsModule {
    keeper: Arc<ParamsKeeper>,
}

pub fn descriptor(keeper: Arc<ParamsKeeper>) -> ModuleDescriptor {
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .with_services(Arc::new(ParamsModule { keeper }))
}

impl ServiceRegistrar for ParamsModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        cfg.register_query(MODULE_NAME, Arc::new(Querier(Arc::clone(&self.keeper))))
    }
}

struct Querier(Arc<ParamsKeeper>);

impl QueryHandler for Querier {
    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> Result<Vec<u8>, TxError> {
        if path.is_empty() {
            return encode_response(&self.0.subspace_names());
        }
        let subspace = self.0.get_subspace(path).ok_or_else(|| {
            TxError::new(
                TxErrorKind::UnknownRequest,
                format!("unknown params subspace {path}"),
            )
        })?;
        encode_response(&subspace.get_all(ctx)?)
    }
}
