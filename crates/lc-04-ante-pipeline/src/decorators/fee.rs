//! Fee admission and deduction.

use std::sync::Arc;

use lc_01_state_store::Context;
use shared_types::{Coin, Coins, Event, Tx, TxError, TxErrorKind};
use tracing::debug;

use crate::handler::AnteDecorator;
use crate::ports::{AccountKeeper, BankKeeper, FeegrantKeeper};

/// Local mempool filter: in CheckTx the fee must cover the node's minimum
/// gas prices for at least one denomination. Never runs in DeliverTx, since
/// minimum prices are node-local and not part of consensus.
pub struct MempoolFeeDecorator;

impl AnteDecorator for MempoolFeeDecorator {
    fn name(&self) -> &'static str {
        "MempoolFee"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, simulate: bool) -> Result<(), TxError> {
        if !ctx.is_check_tx() || simulate || ctx.min_gas_prices().is_zero() {
            return Ok(());
        }
        let fee = &tx.auth_info.fee;
        let gas = u128::from(fee.gas_limit);
        let required = Coins::from_unsorted(
            ctx.min_gas_prices()
                .iter()
                .map(|p| Coin::new(p.denom.clone(), p.amount.saturating_mul(gas))),
        );
        let covered = required
            .iter()
            .any(|r| fee.amount.amount_of(&r.denom) >= r.amount);
        if !covered {
            return Err(TxError::new(
                TxErrorKind::InsufficientFee,
                format!("insufficient fees; got: {} required: {}", fee.amount, required),
            ));
        }
        Ok(())
    }
}

/// Moves the fee from the payer (or the fee granter) to the fee collector.
pub struct DeductFeeDecorator {
    ak: Arc<dyn AccountKeeper>,
    bank: Arc<dyn BankKeeper>,
    feegrant: Option<Arc<dyn FeegrantKeeper>>,
    fee_collector: String,
}

impl DeductFeeDecorator {
    pub fn new(
        ak: Arc<dyn AccountKeeper>,
        bank: Arc<dyn BankKeeper>,
        feegrant: Option<Arc<dyn FeegrantKeeper>>,
        fee_collector: String,
    ) -> Self {
        Self {
            ak,
            bank,
            feegrant,
            fee_collector,
        }
    }
}

impl AnteDecorator for DeductFeeDecorator {
    fn name(&self) -> &'static str {
        "DeductFee"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, _simulate: bool) -> Result<(), TxError> {
        let fee = &tx.auth_info.fee;
        let payer = tx
            .fee_payer()
            .ok_or_else(|| TxError::new(TxErrorKind::InvalidRequest, "transaction has no fee payer"))?;

        let mut deduct_from = payer;
        if let Some(granter) = fee.granter.filter(|g| *g != payer) {
            let feegrant = self.feegrant.as_ref().ok_or_else(|| {
                TxError::new(TxErrorKind::InvalidRequest, "fee grants are not enabled")
            })?;
            feegrant
                .use_granted_fees(ctx, &granter, &payer, &fee.amount, &tx.body.messages)
                .map_err(|e| {
                    TxError::new(
                        TxErrorKind::FeeGrant,
                        format!("{granter} does not allow to pay fees for {payer}: {}", e.detail),
                    )
                })?;
            deduct_from = granter;
        }

        if self.ak.get_account(ctx, &deduct_from)?.is_none() {
            return Err(TxError::new(
                TxErrorKind::UnknownAddress,
                format!("fee payer address: {deduct_from} does not exist"),
            ));
        }

        if !fee.amount.is_zero() {
            self.bank
                .send_coins_from_account_to_module(ctx, &deduct_from, &self.fee_collector, &fee.amount)
                .map_err(|e| {
                    TxError::new(
                        TxErrorKind::InsufficientFunds,
                        format!("insufficient funds to pay for fees; {}", e.detail),
                    )
                })?;
            debug!("[Ante] Deducted {} from {}", fee.amount, deduct_from);
        }

        ctx.emit_event(
            Event::new("tx")
                .attr("fee", &fee.amount)
                .attr("fee_payer", deduct_from),
        );
        Ok(())
    }
}
