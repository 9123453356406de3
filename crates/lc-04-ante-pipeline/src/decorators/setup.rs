use lc_01_state_store::{Context, GasMeter};
use shared_types::{Tx, TxError};

use crate::handler::AnteDecorator;

/// Installs the transaction's gas meter. Must be the first decorator so every
/// later step is charged against the fee's gas limit. Simulation runs with an
/// unlimited meter to measure the gas a transaction needs.
pub struct SetUpContextDecorator;

impl AnteDecorator for SetUpContextDecorator {
    fn name(&self) -> &'static str {
        "SetUpContext"
    }

    fn ante_handle(&self, ctx: &mut Context, tx: &Tx, simulate: bool) -> Result<(), TxError> {
        let meter = if simulate {
            GasMeter::infinite()
        } else {
            GasMeter::with_limit(tx.auth_info.fee.gas_limit)
        };
        ctx.set_gas_meter(meter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestEnv;
    use lc_01_state_store::ExecMode;

    #[test]
    fn test_meter_limit_follows_fee() {
        let env = TestEnv::new();
        let mut ctx = env.ctx(ExecMode::DeliverTx);
        let mut tx = Tx::default();
        tx.auth_info.fee.gas_limit = 50_000;

        SetUpContextDecorator.ante_handle(&mut ctx, &tx, false).unwrap();
        assert_eq!(ctx.gas_meter().limit(), Some(50_000));

        SetUpContextDecorator.ante_handle(&mut ctx, &tx, true).unwrap();
        assert_eq!(ctx.gas_meter().limit(), None);
    }
}
