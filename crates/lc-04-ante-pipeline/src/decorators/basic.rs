//! Stateless checks and size-based gas.

use std::sync::Arc;

use lc_01_state_store::Context;
use shared_types::{Tx, TxError, TxErrorKind};

use crate::handler::AnteDecorator;
use crate::ports::AccountKeeper;

/// Upper bound on a fee's gas limit.
pub const MAX_GAS_WANTED: u64 = (1 << 63) - 1;

/// Structural checks that need no state.
pub struct ValidateBasicDecorator;

impl AnteDecorator for ValidateBasicDecorator {
    fn name(&self) -> &'static str {
        "ValidateBasic"
    }

    fn ante_handle(&self, _ctx: &mut Context, tx: &Tx, simulate: bool) -> Result<(), TxError> {
        if tx.body.messages.is_empty() {
            return Err(TxError::new(
                TxErrorKind::InvalidRequest,
                "must contain at least one message",
            ));
        }
        if let Some(msg) = tx.body.messages.iter().find(|m| m.signers.is_empty()) {
            return Err(TxError::new(
                TxErrorKind::InvalidRequest,
                format!("message {} has no signers", msg.type_url),
            ));
        }
        if tx.auth_info.fee.gas_limit > MAX_GAS_WANTED {
            return Err(TxError::new(
                TxErrorKind::InvalidRequest,
                format!(
                    "invalid gas supplied; {} > {}",
                    tx.auth_info.fee.gas_limit, MAX_GAS_WANTED
                ),
            ));
        }

        let signers = tx.signers();
        if tx.auth_info.signer_infos.len() != signers.len() {
            return Err(TxError::new(
                TxErrorKind::Unauthorized,
                format!(
                    "invalid number of signer infos; expected {}, got {}",
                    signers.len(),
                    tx.auth_info.signer_infos.len()
                ),
            ));
        }
        if simulate {
            return Ok(());
        }
        if tx.signatures.is_empty() {
            return Err(TxError::new(TxErrorKind::NoSignatures, "no signatures supplied"));
        }
        if tx.signatures.len() != signers.len() {
            return Err(TxError::new(
                TxErrorKind::Unauthorized,
                format!(
                    "wrong number of signers; expected {}, got {}",
                    signers.len(),
                    tx.signatures.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Rejects transactions whose timeout height has passed.
pub struct TxTimeoutHeightDecorator;

impl AnteDecorator for TxTimeoutHeightDecorator {
    fn name(&self) -> &'static str {
        "TxTimeoutHeight"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, _simulate: bool) -> Result<(), TxError> {
        let timeout = tx.body.timeout_height;
        if timeout > 0 && ctx.block_height() > timeout {
            return Err(TxError::new(
                TxErrorKind::TxTimeoutHeight,
                format!(
                    "block height: {}, timeout height: {}",
                    ctx.block_height(),
                    timeout
                ),
            ));
        }
        Ok(())
    }
}

pub struct ValidateMemoDecorator {
    ak: Arc<dyn AccountKeeper>,
}

impl ValidateMemoDecorator {
    pub fn new(ak: Arc<dyn AccountKeeper>) -> Self {
        Self { ak }
    }
}

impl AnteDecorator for ValidateMemoDecorator {
    fn name(&self) -> &'static str {
        "ValidateMemo"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, _simulate: bool) -> Result<(), TxError> {
        let max = self.ak.params(ctx)?.max_memo_characters;
        let len = tx.body.memo.chars().count() as u64;
        if len > max {
            return Err(TxError::new(
                TxErrorKind::MemoTooLarge,
                format!("maximum number of characters is {max} but received {len} characters"),
            ));
        }
        Ok(())
    }
}

/// Charges gas proportional to the encoded transaction size.
pub struct ConsumeTxSizeGasDecorator {
    ak: Arc<dyn AccountKeeper>,
}

impl ConsumeTxSizeGasDecorator {
    pub fn new(ak: Arc<dyn AccountKeeper>) -> Self {
        Self { ak }
    }
}

impl AnteDecorator for ConsumeTxSizeGasDecorator {
    fn name(&self) -> &'static str {
        "ConsumeTxSizeGas"
    }

    fn ante_handle(&self, ctx: &mut Context, _tx: &Tx, _simulate: bool) -> Result<(), TxError> {
        let per_byte = self.ak.params(ctx)?.tx_size_cost_per_byte;
        let size = ctx.tx_size();
        ctx.consume_gas(per_byte.saturating_mul(size), "txSize")?;
        Ok(())
    }
}
