//! # Signature Handling
//!
//! ```text
//! SetPubKey → ValidateSigCount → SigGasConsume → SigVerification → IncrementSequence
//! ```
//!
//! Signers are `Tx::signers()`; `signer_infos[i]` and `signatures[i]` belong
//! to signer `i`.

use std::sync::Arc;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use lc_01_state_store::Context;
use shared_types::{Address, BaseAccount, PubKey, Tx, TxError, TxErrorKind};

use crate::handler::AnteDecorator;
use crate::ports::AccountKeeper;

fn require_account(
    ak: &dyn AccountKeeper,
    ctx: &mut Context,
    addr: &Address,
) -> Result<BaseAccount, TxError> {
    ak.get_account(ctx, addr)?.ok_or_else(|| {
        TxError::new(
            TxErrorKind::UnknownAddress,
            format!("account {addr} does not exist"),
        )
    })
}

/// Stores the public key supplied in the signer info on first use.
pub struct SetPubKeyDecorator {
    ak: Arc<dyn AccountKeeper>,
}

impl SetPubKeyDecorator {
    pub fn new(ak: Arc<dyn AccountKeeper>) -> Self {
        Self { ak }
    }
}

impl AnteDecorator for SetPubKeyDecorator {
    fn name(&self) -> &'static str {
        "SetPubKey"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, _simulate: bool) -> Result<(), TxError> {
        for (signer, info) in tx.signers().iter().zip(&tx.auth_info.signer_infos) {
            let Some(pk) = info.public_key else {
                continue;
            };
            if pk.address() != *signer {
                return Err(TxError::new(
                    TxErrorKind::InvalidPubKey,
                    format!("pubKey does not match signer address {signer}"),
                ));
            }
            let mut account = require_account(self.ak.as_ref(), ctx, signer)?;
            if account.pub_key.is_none() {
                account.pub_key = Some(pk);
                self.ak.set_account(ctx, &account)?;
            }
        }
        Ok(())
    }
}

/// Caps the number of signatures a transaction may carry.
pub struct ValidateSigCountDecorator {
    ak: Arc<dyn AccountKeeper>,
}

impl ValidateSigCountDecorator {
    pub fn new(ak: Arc<dyn AccountKeeper>) -> Self {
        Self { ak }
    }
}

impl AnteDecorator for ValidateSigCountDecorator {
    fn name(&self) -> &'static str {
        "ValidateSigCount"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, _simulate: bool) -> Result<(), TxError> {
        let limit = self.ak.params(ctx)?.tx_sig_limit;
        let count = tx.signers().len() as u64;
        if count > limit {
            return Err(TxError::new(
                TxErrorKind::TooManySignatures,
                format!("signatures: {count}, limit: {limit}"),
            ));
        }
        Ok(())
    }
}

/// Charges the verification cost of every signature.
pub struct SigGasConsumeDecorator {
    ak: Arc<dyn AccountKeeper>,
}

impl SigGasConsumeDecorator {
    pub fn new(ak: Arc<dyn AccountKeeper>) -> Self {
        Self { ak }
    }
}

impl AnteDecorator for SigGasConsumeDecorator {
    fn name(&self) -> &'static str {
        "SigGasConsume"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, simulate: bool) -> Result<(), TxError> {
        let cost = self.ak.params(ctx)?.sig_verify_cost_ed25519;
        for signer in tx.signers() {
            let account = require_account(self.ak.as_ref(), ctx, &signer)?;
            if account.pub_key.is_none() && !simulate {
                return Err(TxError::new(
                    TxErrorKind::InvalidPubKey,
                    format!("pubkey on account {signer} is not set"),
                ));
            }
            ctx.consume_gas(cost, "ante verify: ed25519")?;
        }
        Ok(())
    }
}

/// Checks sequences and verifies every signature over the canonical sign
/// bytes. Simulation checks sequences only.
pub struct SigVerificationDecorator {
    ak: Arc<dyn AccountKeeper>,
}

impl SigVerificationDecorator {
    pub fn new(ak: Arc<dyn AccountKeeper>) -> Self {
        Self { ak }
    }
}

impl AnteDecorator for SigVerificationDecorator {
    fn name(&self) -> &'static str {
        "SigVerification"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, simulate: bool) -> Result<(), TxError> {
        let chain_id = ctx.chain_id().to_string();
        for (i, signer) in tx.signers().iter().enumerate() {
            let account = require_account(self.ak.as_ref(), ctx, signer)?;
            let info = tx.auth_info.signer_infos.get(i).ok_or_else(|| {
                TxError::new(TxErrorKind::Unauthorized, format!("no signer info for {signer}"))
            })?;
            if info.sequence != account.sequence {
                return Err(TxError::new(
                    TxErrorKind::WrongSequence,
                    format!(
                        "account sequence mismatch, expected {}, got {}",
                        account.sequence, info.sequence
                    ),
                ));
            }
            if simulate {
                continue;
            }

            let pk = account.pub_key.ok_or_else(|| {
                TxError::new(
                    TxErrorKind::InvalidPubKey,
                    format!("pubkey on account {signer} is not set"),
                )
            })?;
            let sig = tx.signatures.get(i).ok_or_else(|| {
                TxError::new(TxErrorKind::Unauthorized, format!("no signature for {signer}"))
            })?;
            let sign_bytes = tx.sign_bytes(&chain_id, account.account_number, account.sequence)?;
            verify_ed25519(&pk, &sign_bytes, &sig.0).map_err(|detail| {
                TxError::new(
                    TxErrorKind::Unauthorized,
                    format!(
                        "signature verification failed; please verify account number ({}), sequence ({}) and chain-id ({}): {}",
                        account.account_number, account.sequence, chain_id, detail
                    ),
                )
            })?;
        }
        Ok(())
    }
}

fn verify_ed25519(pk: &PubKey, msg: &[u8], sig: &[u8]) -> Result<(), String> {
    let key = VerifyingKey::from_bytes(&pk.0).map_err(|e| e.to_string())?;
    let sig = Signature::from_slice(sig).map_err(|e| e.to_string())?;
    key.verify(msg, &sig).map_err(|e| e.to_string())
}

/// Bumps every signer's sequence. Last in the chain.
pub struct IncrementSequenceDecorator {
    ak: Arc<dyn AccountKeeper>,
}

impl IncrementSequenceDecorator {
    pub fn new(ak: Arc<dyn AccountKeeper>) -> Self {
        Self { ak }
    }
}

impl AnteDecorator for IncrementSequenceDecorator {
    fn name(&self) -> &'static str {
        "IncrementSequence"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, _simulate: bool) -> Result<(), TxError> {
        for signer in tx.signers() {
            let mut account = require_account(self.ak.as_ref(), ctx, &signer)?;
            account.sequence = account.sequence.checked_add(1).ok_or_else(|| {
                TxError::new(
                    TxErrorKind::WrongSequence,
                    format!("sequence of {} is exhausted", signer),
                )
            })?;
            self.ak.set_account(ctx, &account)?;
        }
        Ok(())
    }
}
