//! # Ante Handler
//!
//! Runs the configured decorators in order. The first rejection stops the
//! chain; later decorators are never invoked.
//!
//! ## Revert-on-Reject
//!
//! The chain runs inside `Context::branch_scope`. On rejection the layer and
//! the events emitted by the chain are discarded and the gas meter that was
//! installed before the chain is put back, so the context is exactly as it
//! was before `process`.

use std::sync::Arc;

use lc_01_state_store::Context;
use shared_types::{ConfigError, Tx, TxError};
use tracing::{debug, info};

use crate::decorators::{
    ConsumeTxSizeGasDecorator, DeductFeeDecorator, IncrementSequenceDecorator,
    MempoolFeeDecorator, SetPubKeyDecorator, SetUpContextDecorator, SigGasConsumeDecorator,
    SigVerificationDecorator, TxTimeoutHeightDecorator, ValidateBasicDecorator,
    ValidateMemoDecorator, ValidateSigCountDecorator,
};
use crate::ports::{AccountKeeper, BankKeeper, FeegrantKeeper};

/// One link of the chain.
pub trait AnteDecorator: Send + Sync {
    fn name(&self) -> &'static str;

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, simulate: bool) -> Result<(), TxError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject(TxError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnteOutcome {
    pub gas_wanted: u64,
    /// Gas consumed by the chain, including the step that failed.
    pub gas_used: u64,
    pub admission: Admission,
}

impl AnteOutcome {
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        self.admission == Admission::Admit
    }
}

pub struct AnteHandler {
    decorators: Vec<Arc<dyn AnteDecorator>>,
}

impl AnteHandler {
    pub fn new(decorators: Vec<Arc<dyn AnteDecorator>>) -> Self {
        Self { decorators }
    }

    /// Decorator names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.decorators.iter().map(|d| d.name()).collect()
    }

    pub fn process(&self, ctx: &mut Context, tx: &Tx, simulate: bool) -> AnteOutcome {
        let gas_wanted = tx.auth_info.fee.gas_limit;
        let saved_meter = ctx.gas_meter().clone();

        let result = ctx.branch_scope(|ctx| {
            for decorator in &self.decorators {
                decorator.ante_handle(ctx, tx, simulate).map_err(|e| {
                    debug!("[Ante] {} rejected tx: {}", decorator.name(), e);
                    e
                })?;
            }
            Ok::<(), TxError>(())
        });

        let gas_used = ctx.gas_meter().consumed();
        match result {
            Ok(()) => AnteOutcome {
                gas_wanted,
                gas_used,
                admission: Admission::Admit,
            },
            Err(err) => {
                ctx.set_gas_meter(saved_meter);
                AnteOutcome {
                    gas_wanted,
                    gas_used,
                    admission: Admission::Reject(err),
                }
            }
        }
    }
}

/// Keepers and settings for the standard chain.
#[derive(Clone, Default)]
pub struct HandlerOptions {
    pub account_keeper: Option<Arc<dyn AccountKeeper>>,
    pub bank_keeper: Option<Arc<dyn BankKeeper>>,
    /// Optional; without it fee grants are rejected.
    pub feegrant_keeper: Option<Arc<dyn FeegrantKeeper>>,
    /// Module account receiving fees. Defaults to `fee_collector`.
    pub fee_collector: Option<String>,
}

/// Assemble the standard decorator chain.
pub fn new_ante_handler(options: HandlerOptions) -> Result<AnteHandler, ConfigError> {
    let ak = options
        .account_keeper
        .ok_or(ConfigError::MissingKeeper("account keeper"))?;
    let bk = options
        .bank_keeper
        .ok_or(ConfigError::MissingKeeper("bank keeper"))?;
    let fee_collector = options
        .fee_collector
        .unwrap_or_else(|| "fee_collector".to_string());
    if ak.module_address(&fee_collector).is_none() {
        return Err(ConfigError::Invalid(format!(
            "fee collector '{fee_collector}' is not a module account"
        )));
    }

    let decorators: Vec<Arc<dyn AnteDecorator>> = vec![
        Arc::new(SetUpContextDecorator),
        Arc::new(ValidateBasicDecorator),
        Arc::new(TxTimeoutHeightDecorator),
        Arc::new(ValidateMemoDecorator::new(ak.clone())),
        Arc::new(ConsumeTxSizeGasDecorator::new(ak.clone())),
        Arc::new(MempoolFeeDecorator),
        Arc::new(DeductFeeDecorator::new(
            ak.clone(),
            bk,
            options.feegrant_keeper,
            fee_collector,
        )),
        Arc::new(SetPubKeyDecorator::new(ak.clone())),
        Arc::new(ValidateSigCountDecorator::new(ak.clone())),
        Arc::new(SigGasConsumeDecorator::new(ak.clone())),
        Arc::new(SigVerificationDecorator::new(ak.clone())),
        Arc::new(IncrementSequenceDecorator::new(ak)),
    ];
    let handler = AnteHandler::new(decorators);
    info!("[Ante] Assembled chain: {}", handler.names().join(" → "));
    Ok(handler)
}
