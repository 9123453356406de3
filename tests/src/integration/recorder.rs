//! A configurable module that records every lifecycle callback.

use std::collections::BTreeMap;
use std::sync::Arc;

use lc_01_state_store::{CommitMultiStore, Context, ExecMode, StoreKey, StoreKeyRegistry};
use lc_03_module_manager::{
    BeginBlockRequest, BeginBlocker, EndBlockRequest, EndBlocker, GenesisHandler,
    ModuleDescriptor,
};
use parking_lot::Mutex;
use shared_types::{BlockHeader, Event, ModuleError, PubKey, ValidatorUpdate};

pub type Log = Arc<Mutex<Vec<String>>>;

pub struct Recorder {
    pub name: String,
    pub key: StoreKey,
    pub log: Log,
    pub fail_genesis: bool,
}

impl GenesisHandler for Recorder {
    fn default_genesis(&self) -> serde_json::Value {
        serde_json::json!({ "marker": self.name })
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        match state.get("marker") {
            Some(_) => Ok(()),
            None => Err(ModuleError::Invalid("marker missing".into())),
        }
    }

    fn init_genesis(
        &self,
        ctx: &mut Context,
        _state: &serde_json::Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        self.log.lock().push(format!("genesis:{}", self.name));
        ctx.kv(&self.key).set(b"marker", self.name.as_bytes().to_vec())?;
        if self.fail_genesis {
            return Err(ModuleError::Invalid(format!("{} refuses genesis", self.name)));
        }
        Ok(vec![ValidatorUpdate {
            pub_key: PubKey([self.name.as_bytes()[0]; 32]),
            power: 1,
        }])
    }

    fn export_genesis(&self, _ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        Ok(self.default_genesis())
    }
}

impl BeginBlocker for Recorder {
    fn begin_block(&self, ctx: &mut Context, _req: &BeginBlockRequest) -> Result<(), ModuleError> {
        self.log.lock().push(format!("begin:{}", self.name));
        ctx.emit_event(Event::new("begin").attr("module", &self.name));
        Ok(())
    }
}

impl EndBlocker for Recorder {
    fn end_block(
        &self,
        _ctx: &mut Context,
        _req: &EndBlockRequest,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        self.log.lock().push(format!("end:{}", self.name));
        Ok(vec![ValidatorUpdate {
            pub_key: PubKey([self.name.as_bytes()[0]; 32]),
            power: 2,
        }])
    }
}

/// Recorders sharing one log, each with its own mounted partition.
pub struct RecorderSet {
    pub log: Log,
    pub keys: BTreeMap<String, StoreKey>,
    pub cms: CommitMultiStore,
}

impl RecorderSet {
    pub fn new(names: &[&str]) -> Self {
        let keys = StoreKeyRegistry::new().allocate_kv(names).unwrap();
        let mut cms = CommitMultiStore::new();
        cms.mount_all(keys.values()).unwrap();
        Self {
            log: Log::default(),
            keys,
            cms,
        }
    }

    fn recorder(&self, name: &str, fail_genesis: bool) -> Arc<Recorder> {
        Arc::new(Recorder {
            name: name.to_string(),
            key: self.keys[name].clone(),
            log: Arc::clone(&self.log),
            fail_genesis,
        })
    }

    /// A module taking part in every ordered phase.
    pub fn full(&self, name: &str) -> ModuleDescriptor {
        self.descriptor(name, false)
    }

    pub fn failing_genesis(&self, name: &str) -> ModuleDescriptor {
        self.descriptor(name, true)
    }

    fn descriptor(&self, name: &str, fail_genesis: bool) -> ModuleDescriptor {
        let r = self.recorder(name, fail_genesis);
        ModuleDescriptor::new(name)
            .with_genesis(r.clone())
            .with_begin_block(r.clone())
            .with_end_block(r)
    }

    /// A module with begin-block only.
    pub fn begin_only(&self, name: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(name).with_begin_block(self.recorder(name, false))
    }

    pub fn ctx(&self, height: u64) -> Context {
        Context::new(
            self.cms.branch(),
            BlockHeader {
                chain_id: "recorder".into(),
                height,
                ..Default::default()
            },
            ExecMode::Genesis,
        )
    }

    pub fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock())
    }
}
