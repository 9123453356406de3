//! # Transactions
//!
//! The transaction envelope handled by the ante pipeline and the message router.
//! Message payloads are opaque JSON values; each module decodes its own.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::coins::Coins;
use crate::entities::{Address, HexBytes, PubKey};
use crate::errors::{TxError, TxErrorKind};

/// A message routed to a module by its `type_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Msg {
    /// Routing key, e.g. `/bank.MsgSend`.
    pub type_url: String,
    /// Addresses that must sign the transaction carrying this message.
    pub signers: Vec<Address>,
    pub value: serde_json::Value,
}

impl Msg {
    /// Build a message from a typed payload.
    pub fn new<T: Serialize>(
        type_url: impl Into<String>,
        signers: Vec<Address>,
        payload: &T,
    ) -> Result<Self, TxError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| TxError::new(TxErrorKind::TxDecode, e.to_string()))?;
        Ok(Self {
            type_url: type_url.into(),
            signers,
            value,
        })
    }

    /// Decode the payload into the handler's message type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TxError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            TxError::new(
                TxErrorKind::TxDecode,
                format!("malformed {} payload: {}", self.type_url, e),
            )
        })
    }
}

/// Fee offered by the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Fee {
    pub amount: Coins,
    pub gas_limit: u64,
    /// Overrides the default fee payer (the first signer).
    #[serde(default)]
    pub payer: Option<Address>,
    /// Account whose fee allowance pays the fee.
    #[serde(default)]
    pub granter: Option<Address>,
}

/// Per-signer authentication data, in the order of `Tx::signers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInfo {
    /// Required for the first transaction of an account.
    #[serde(default)]
    pub public_key: Option<PubKey>,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthInfo {
    pub signer_infos: Vec<SignerInfo>,
    pub fee: Fee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TxBody {
    pub messages: Vec<Msg>,
    #[serde(default)]
    pub memo: String,
    /// Zero disables the timeout.
    #[serde(default)]
    pub timeout_height: u64,
}

/// A signed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub signatures: Vec<HexBytes>,
}

/// The canonical document each signer signs.
#[derive(Serialize)]
pub struct SignDoc<'a> {
    pub chain_id: &'a str,
    pub account_number: u64,
    pub sequence: u64,
    pub body: &'a TxBody,
    pub fee: &'a Fee,
}

impl Tx {
    /// Decode raw transaction bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, TxError> {
        serde_json::from_slice(raw).map_err(|e| TxError::new(TxErrorKind::TxDecode, e.to_string()))
    }

    /// Encode to raw transaction bytes.
    pub fn encode(&self) -> Result<Vec<u8>, TxError> {
        serde_json::to_vec(self).map_err(|e| TxError::new(TxErrorKind::TxDecode, e.to_string()))
    }

    /// Unique signers across all messages, in order of first appearance.
    #[must_use]
    pub fn signers(&self) -> Vec<Address> {
        let mut out: Vec<Address> = Vec::new();
        for signer in self.body.messages.iter().flat_map(|m| m.signers.iter()) {
            if !out.contains(signer) {
                out.push(*signer);
            }
        }
        out
    }

    /// The account paying the fee.
    #[must_use]
    pub fn fee_payer(&self) -> Option<Address> {
        self.auth_info
            .fee
            .payer
            .or_else(|| self.signers().first().copied())
    }

    /// Bytes signed by a signer with the given account number and sequence.
    pub fn sign_bytes(
        &self,
        chain_id: &str,
        account_number: u64,
        sequence: u64,
    ) -> Result<Vec<u8>, TxError> {
        let doc = SignDoc {
            chain_id,
            account_number,
            sequence,
            body: &self.body,
            fee: &self.auth_info.fee,
        };
        serde_json::to_vec(&doc).map_err(|e| TxError::new(TxErrorKind::TxDecode, e.to_string()))
    }
}
