//! # Local Driver
//!
//! Stands in for a consensus engine: it tracks the validator set from the
//! updates the application returns and produces blocks in which every
//! validator signed the previous one. Block time is derived from the height,
//! never from the wall clock.

use std::collections::BTreeMap;

use lc_03_module_manager::{BeginBlockRequest, EndBlockRequest};
use shared_types::{BlockHeader, PubKey, ValidatorUpdate, VoteInfo};
use tracing::{debug, info};

use crate::app::{App, CommitResponse, InitChainRequest};
use crate::container::AppConfig;
use crate::error::AppError;
use crate::genesis::GenesisDoc;

pub struct LocalDriver {
    app: App,
    validators: BTreeMap<PubKey, i64>,
    genesis_time: u64,
    block_secs: u64,
    last_app_hash: [u8; 32],
}

impl LocalDriver {
    /// Build the application and initialize it from the configured genesis
    /// file, or from every module's default state when none is set.
    pub fn start(config: AppConfig) -> Result<Self, AppError> {
        let genesis = match &config.genesis_file {
            Some(path) => {
                info!("[Driver] Loading genesis from {}", path.display());
                Some(GenesisDoc::load(path)?)
            }
            None => None,
        };
        let app = App::build(config)?;
        let genesis = genesis.unwrap_or_else(|| app.default_genesis());
        Self::with_genesis(app, &genesis)
    }

    pub fn with_genesis(mut app: App, genesis: &GenesisDoc) -> Result<Self, AppError> {
        let block_secs = (app.config().driver.block_time_ms / 1_000).max(1);
        let updates = app.init_chain(InitChainRequest {
            chain_id: genesis.chain_id.clone(),
            genesis_time: genesis.genesis_time,
            app_state_bytes: genesis.app_state_bytes()?,
        })?;
        let mut driver = Self {
            app,
            validators: BTreeMap::new(),
            genesis_time: genesis.genesis_time,
            block_secs,
            last_app_hash: [0; 32],
        };
        driver.apply_updates(&updates);
        Ok(driver)
    }

    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    /// Current validator set by consensus key.
    #[must_use]
    pub fn validators(&self) -> &BTreeMap<PubKey, i64> {
        &self.validators
    }

    fn apply_updates(&mut self, updates: &[ValidatorUpdate]) {
        for update in updates {
            if update.power <= 0 {
                self.validators.remove(&update.pub_key);
            } else {
                self.validators.insert(update.pub_key, update.power);
            }
        }
    }

    fn votes(&self) -> Vec<VoteInfo> {
        self.validators
            .iter()
            .map(|(pk, power)| VoteInfo {
                validator: pk.address(),
                power: *power,
                signed_last_block: true,
            })
            .collect()
    }

    /// Produce one block carrying `txs`.
    pub fn produce_block(&mut self, txs: &[Vec<u8>]) -> Result<CommitResponse, AppError> {
        let height = self.app.last_height() + 1;
        let header = BlockHeader {
            chain_id: self.app.config().chain_id.clone(),
            height,
            time: self.genesis_time + height * self.block_secs,
            proposer: self
                .validators
                .keys()
                .next()
                .map(PubKey::address)
                .unwrap_or_default(),
            last_block_hash: self.last_app_hash,
        };
        let votes = if height > 1 { self.votes() } else { Vec::new() };

        self.app.begin_block(BeginBlockRequest {
            header,
            last_commit_info: votes,
        })?;
        for raw in txs {
            let result = self.app.deliver_tx(raw)?;
            debug!("[Driver] tx code={} gas_used={}", result.code, result.gas_used);
        }
        let end = self.app.end_block(EndBlockRequest { height })?;
        self.apply_updates(&end.validator_updates);
        let commit = self.app.commit()?;
        self.last_app_hash = commit.app_hash;
        Ok(commit)
    }
}
