//! # Execution Context
//!
//! Everything a module callback, ante decorator or message handler may touch:
//! the block header, a branch of the state, the gas meter and the event
//! buffer. One context is opened per block phase (and per transaction).

use shared_types::{BlockHeader, Coins, Event, StoreError};

use crate::domain::{CacheMultiStore, GasMeter, KvStore, StoreKey};

/// What the context is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Genesis,
    BeginBlock,
    DeliverTx,
    CheckTx,
    EndBlock,
    Query,
}

pub struct Context {
    header: BlockHeader,
    mode: ExecMode,
    store: CacheMultiStore,
    gas_meter: GasMeter,
    events: Vec<Event>,
    min_gas_prices: Coins,
    tx_size: u64,
}

impl Context {
    pub fn new(store: CacheMultiStore, header: BlockHeader, mode: ExecMode) -> Self {
        Self {
            header,
            mode,
            store,
            gas_meter: GasMeter::infinite(),
            events: Vec::new(),
            min_gas_prices: Coins::empty(),
            tx_size: 0,
        }
    }

    #[must_use]
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    #[must_use]
    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    #[must_use]
    pub fn block_height(&self) -> u64 {
        self.header.height
    }

    /// Block time in Unix seconds.
    #[must_use]
    pub fn block_time(&self) -> u64 {
        self.header.time
    }

    #[must_use]
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExecMode) {
        self.mode = mode;
    }

    #[must_use]
    pub fn is_check_tx(&self) -> bool {
        self.mode == ExecMode::CheckTx
    }

    /// Gas-metered access to the partition of `key`.
    pub fn kv<'a>(&'a mut self, key: &'a StoreKey) -> KvStore<'a> {
        KvStore::new(&mut self.store, key, &mut self.gas_meter)
    }

    #[must_use]
    pub fn store(&self) -> &CacheMultiStore {
        &self.store
    }

    #[must_use]
    pub fn gas_meter(&self) -> &GasMeter {
        &self.gas_meter
    }

    /// Install a new meter, returning the previous one.
    pub fn set_gas_meter(&mut self, meter: GasMeter) -> GasMeter {
        std::mem::replace(&mut self.gas_meter, meter)
    }

    pub fn consume_gas(&mut self, amount: u64, descriptor: &str) -> Result<(), StoreError> {
        self.gas_meter.consume(amount, descriptor)
    }

    pub fn emit_event(&mut self, event: Event) {
        self.events.push(event);
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drain the buffered events.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn min_gas_prices(&self) -> &Coins {
        &self.min_gas_prices
    }

    pub fn set_min_gas_prices(&mut self, prices: Coins) {
        self.min_gas_prices = prices;
    }

    /// Encoded size of the transaction being processed.
    #[must_use]
    pub fn tx_size(&self) -> u64 {
        self.tx_size
    }

    pub fn set_tx_size(&mut self, size: u64) {
        self.tx_size = size;
    }

    /// Run `f` in a nested layer. On `Ok` its writes and events are kept; on
    /// `Err` both are discarded and the context is as before the call.
    pub fn branch_scope<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Context) -> Result<T, E>,
        E: From<StoreError>,
    {
        let event_mark = self.events.len();
        self.store.push_layer();
        match f(self) {
            Ok(value) => {
                self.store.commit_layer()?;
                Ok(value)
            }
            Err(err) => {
                self.store.discard_layer()?;
                self.events.truncate(event_mark);
                Err(err)
            }
        }
    }

    /// Close the context and hand back its branch.
    pub fn into_store(self) -> CacheMultiStore {
        self.store
    }
}
