//! EIP-712 action signing for Hyperliquid
//!
//! Exchange actions are authenticated by hashing the canonical MessagePack
//! action bytes together with the nonce into a `connectionId`, wrapping it in
//! the `Agent` typed struct, and signing the EIP-712 digest with the API
//! wallet key. The domain is fixed: `{name: "Exchange", version: "1",
//! chainId: 1337, verifyingContract: 0x0}`.
//!
//! The signer itself is derived lazily on the first signing operation so
//! connector construction never blocks on OS entropy.

use crate::actions::{ActionSignature, ExchangeAction};
use crate::config::PrivateKey;
use crate::errors::{HyperfillError, Result};
use crate::types::SignerAddress;
use alloy_primitives::{keccak256, Address, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{eip712_domain, sol, SolStruct};
use std::str::FromStr;
use std::sync::OnceLock;

sol! {
    /// EIP-712 struct carrying the action digest
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// Signs exchange actions with the API wallet key
///
/// Signature recovery yields the API wallet address, never the master
/// account; the venue looks up the wallet's trading authorization from it.
pub struct ActionSigner {
    secret_key: PrivateKey,
    is_testnet: bool,
    vault_address: Option<String>,
    signer: OnceLock<PrivateKeySigner>,
}

impl ActionSigner {
    pub fn new(secret_key: PrivateKey, is_testnet: bool) -> Self {
        Self {
            secret_key,
            is_testnet,
            vault_address: None,
            signer: OnceLock::new(),
        }
    }

    pub fn with_vault_address(mut self, vault_address: String) -> Self {
        self.vault_address = Some(vault_address);
        self
    }

    pub fn vault_address(&self) -> Option<&str> {
        self.vault_address.as_deref()
    }

    /// Memoized ECDSA signer; built on first use
    fn ensure_signer(&self) -> Result<&PrivateKeySigner> {
        match self.signer.get() {
            Some(signer) => Ok(signer),
            None => {
                let parsed = PrivateKeySigner::from_str(self.secret_key.as_hex())
                    .map_err(|e| HyperfillError::config(format!("invalid secret_key: {e}")))?;
                Ok(self.signer.get_or_init(|| parsed))
            }
        }
    }

    /// The address signatures recover to
    pub fn address(&self) -> Result<SignerAddress> {
        let signer = self.ensure_signer()?;
        Ok(SignerAddress::from_bytes(signer.address().0 .0))
    }

    /// `keccak256(msgpack(action) ‖ nonce_be ‖ vault_flag)`
    fn connection_id(&self, action: &ExchangeAction, nonce: u64) -> Result<B256> {
        let mut bytes = action.action_bytes()?;
        bytes.extend_from_slice(&nonce.to_be_bytes());
        match &self.vault_address {
            Some(vault) => {
                bytes.push(1);
                let vault_hex = vault.trim_start_matches("0x");
                let vault_bytes = hex::decode(vault_hex)
                    .map_err(|e| HyperfillError::config(format!("invalid vault address: {e}")))?;
                bytes.extend_from_slice(&vault_bytes);
            }
            None => bytes.push(0),
        }
        Ok(keccak256(&bytes))
    }

    /// Sign an action for submission with the given nonce
    pub fn sign(&self, action: &ExchangeAction, nonce: u64) -> Result<ActionSignature> {
        let connection_id = self.connection_id(action, nonce)?;
        let agent = Agent {
            // Mainnet actions hash with source "a", testnet with "b"
            source: if self.is_testnet { "b" } else { "a" }.to_string(),
            connectionId: connection_id,
        };
        let domain = eip712_domain! {
            name: "Exchange",
            version: "1",
            chain_id: 1337,
            verifying_contract: Address::ZERO,
        };
        let signing_hash = agent.eip712_signing_hash(&domain);

        let signer = self.ensure_signer()?;
        let signature = signer
            .sign_hash_sync(&signing_hash)
            .map_err(|e| HyperfillError::signature_rejected(format!("signing failed: {e}")))?;

        Ok(ActionSignature {
            r: format!("0x{:064x}", signature.r()),
            s: format!("0x{:064x}", signature.s()),
            v: if signature.v() { 28 } else { 27 },
        })
    }
}

impl std::fmt::Debug for ActionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSigner")
            .field("secret_key", &self.secret_key)
            .field("is_testnet", &self.is_testnet)
            .field("vault_address", &self.vault_address)
            .field("initialized", &self.signer.get().is_some())
            .finish()
    }
}

/// Derive the API wallet address from a private key without keeping a signer
pub fn derive_signer_address(key: &PrivateKey) -> Result<SignerAddress> {
    let signer = PrivateKeySigner::from_str(key.as_hex())
        .map_err(|e| HyperfillError::config(format!("invalid secret_key: {e}")))?;
    Ok(SignerAddress::from_bytes(signer.address().0 .0))
}
