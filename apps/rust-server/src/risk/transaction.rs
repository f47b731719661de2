// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction model consumed by the risk pipeline.
//!
//! Mirrors the shape of a Solana transaction: an ordered list of
//! instructions, each naming a program and the accounts it touches.
//! Instruction data travels as base64 in JSON.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::programs::{STAKE_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// System program `Transfer` instruction index (u32, little endian).
const SYSTEM_TRANSFER_INDEX: u32 = 2;

/// Token program `Transfer` instruction tag.
const TOKEN_TRANSFER_TAG: u8 = 3;

/// Token program `TransferChecked` instruction tag.
const TOKEN_TRANSFER_CHECKED_TAG: u8 = 12;

/// First data bytes that identify transfer-shaped instructions.
pub const TRANSFER_DISCRIMINATORS: [u8; 3] = [
    SYSTEM_TRANSFER_INDEX as u8,
    TOKEN_TRANSFER_TAG,
    TOKEN_TRANSFER_CHECKED_TAG,
];

/// Structural problems that make a transaction unreadable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("instruction {index} has an empty program id")]
    EmptyProgramId { index: usize },

    #[error("instruction {index} references an account with an empty key")]
    EmptyAccountKey { index: usize },
}

/// An account referenced by an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountMeta {
    /// Base58 account address.
    pub pubkey: String,
    #[serde(default)]
    pub is_signer: bool,
    #[serde(default)]
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: impl Into<String>, is_signer: bool, is_writable: bool) -> Self {
        Self {
            pubkey: pubkey.into(),
            is_signer,
            is_writable,
        }
    }

    pub fn signer(pubkey: impl Into<String>) -> Self {
        Self::new(pubkey, true, true)
    }

    pub fn writable(pubkey: impl Into<String>) -> Self {
        Self::new(pubkey, false, true)
    }

    pub fn readonly(pubkey: impl Into<String>) -> Self {
        Self::new(pubkey, false, false)
    }

    /// Whether the account can be mutated or authorizes the transaction.
    pub fn is_privileged(&self) -> bool {
        self.is_signer || self.is_writable
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Instruction {
    pub program_id: String,
    #[serde(default)]
    pub accounts: Vec<AccountMeta>,
    /// Raw instruction payload (base64).
    #[serde(default, with = "base64_data")]
    #[schema(value_type = String, format = Byte)]
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: impl Into<String>, accounts: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Self {
            program_id: program_id.into(),
            accounts,
            data,
        }
    }

    /// System program transfer of `lamports` from `from` to `to`.
    pub fn system_transfer(from: &str, to: &str, lamports: u64) -> Self {
        let mut data = SYSTEM_TRANSFER_INDEX.to_le_bytes().to_vec();
        data.extend_from_slice(&lamports.to_le_bytes());
        Self::new(
            SYSTEM_PROGRAM_ID,
            vec![AccountMeta::signer(from), AccountMeta::writable(to)],
            data,
        )
    }

    /// SPL token transfer of `amount` base units.
    pub fn token_transfer(source: &str, destination: &str, owner: &str, amount: u64) -> Self {
        let mut data = vec![TOKEN_TRANSFER_TAG];
        data.extend_from_slice(&amount.to_le_bytes());
        Self::new(
            TOKEN_PROGRAM_ID,
            vec![
                AccountMeta::writable(source),
                AccountMeta::writable(destination),
                AccountMeta::signer(owner),
            ],
            data,
        )
    }

    /// First payload byte, if any.
    pub fn tag(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// First data byte matches one of the [`TRANSFER_DISCRIMINATORS`].
    pub fn is_transfer_shaped(&self) -> bool {
        self.tag()
            .is_some_and(|tag| TRANSFER_DISCRIMINATORS.contains(&tag))
    }

    pub fn is_token_program(&self) -> bool {
        self.program_id == TOKEN_PROGRAM_ID || self.program_id == TOKEN_2022_PROGRAM_ID
    }

    pub fn is_native_transfer(&self) -> bool {
        self.program_id == SYSTEM_PROGRAM_ID
            && read_u32(&self.data, 0) == Some(SYSTEM_TRANSFER_INDEX)
    }

    pub fn is_token_transfer(&self) -> bool {
        self.is_token_program()
            && matches!(
                self.tag(),
                Some(TOKEN_TRANSFER_TAG) | Some(TOKEN_TRANSFER_CHECKED_TAG)
            )
    }

    pub fn is_stake(&self) -> bool {
        self.program_id == STAKE_PROGRAM_ID
    }

    /// Lamports moved by a system transfer.
    pub fn native_transfer_lamports(&self) -> Option<u64> {
        if self.is_native_transfer() {
            read_u64(&self.data, 4)
        } else {
            None
        }
    }

    /// Amount field laid out as a one-byte tag followed by a little-endian u64.
    pub fn amount_field(&self) -> Option<u64> {
        read_u64(&self.data, 1)
    }

    /// Payload decodes to a `u64::MAX` amount, the unlimited-approval shape.
    pub fn has_unlimited_amount(&self) -> bool {
        self.amount_field() == Some(u64::MAX)
    }
}

/// A transaction submitted for analysis. Never mutated by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    /// Fee payer address, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer: Option<String>,
    /// Declared transfer value in SOL. Derived from system transfers when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Transaction {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_fee_payer(mut self, fee_payer: impl Into<String>) -> Self {
        self.fee_payer = Some(fee_payer.into());
        self
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn validate(&self) -> Result<(), TransactionError> {
        for (index, ix) in self.instructions.iter().enumerate() {
            if ix.program_id.trim().is_empty() {
                return Err(TransactionError::EmptyProgramId { index });
            }
            if ix.accounts.iter().any(|a| a.pubkey.trim().is_empty()) {
                return Err(TransactionError::EmptyAccountKey { index });
            }
        }
        Ok(())
    }

    /// Distinct instruction accounts in first-seen order, with signer and
    /// writable flags merged across references.
    pub fn accounts(&self) -> Vec<AccountMeta> {
        let mut merged: Vec<AccountMeta> = Vec::new();
        for meta in self.instructions.iter().flat_map(|ix| ix.accounts.iter()) {
            match merged.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                Some(existing) => {
                    existing.is_signer |= meta.is_signer;
                    existing.is_writable |= meta.is_writable;
                }
                None => merged.push(meta.clone()),
            }
        }
        merged
    }

    /// Every distinct identifier the transaction touches: account keys and
    /// program ids, in first-seen order.
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for ix in &self.instructions {
            let keys = ix
                .accounts
                .iter()
                .map(|a| a.pubkey.as_str())
                .chain(std::iter::once(ix.program_id.as_str()));
            for key in keys {
                if seen.insert(key) {
                    ids.push(key);
                }
            }
        }
        ids
    }

    /// Number of distinct signers; the fee payer always signs.
    pub fn signer_count(&self) -> usize {
        let mut signers: HashSet<&str> = self
            .instructions
            .iter()
            .flat_map(|ix| ix.accounts.iter())
            .filter(|a| a.is_signer)
            .map(|a| a.pubkey.as_str())
            .collect();
        if let Some(payer) = self.fee_payer.as_deref() {
            signers.insert(payer);
        }
        signers.len().max(1)
    }

    /// Value moved by the transaction in SOL.
    pub fn value_sol(&self) -> f64 {
        self.value.unwrap_or_else(|| {
            let lamports: u64 = self
                .instructions
                .iter()
                .filter_map(Instruction::native_transfer_lamports)
                .fold(0u64, u64::saturating_add);
            lamports as f64 / LAMPORTS_PER_SOL as f64
        })
    }
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

mod base64_data {
    use base64ct::{Base64, Encoding};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Base64::decode_vec(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_transfer_decodes_lamports() {
        let ix = Instruction::system_transfer("alice", "bob", 2_500_000_000);
        assert!(ix.is_native_transfer());
        assert!(ix.is_transfer_shaped());
        assert_eq!(ix.native_transfer_lamports(), Some(2_500_000_000));
        assert!(!ix.is_token_transfer());
    }

    #[test]
    fn token_transfer_is_recognized() {
        let ix = Instruction::token_transfer("src", "dst", "owner", 10);
        assert!(ix.is_token_transfer());
        assert!(ix.is_token_program());
        assert_eq!(ix.amount_field(), Some(10));
        assert!(!ix.is_native_transfer());
    }

    #[test]
    fn unlimited_amount_detection() {
        let mut data = vec![4u8];
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        let ix = Instruction::new(TOKEN_PROGRAM_ID, vec![], data);
        assert!(ix.has_unlimited_amount());

        let short = Instruction::new(TOKEN_PROGRAM_ID, vec![], vec![4, 0xff]);
        assert!(!short.has_unlimited_amount());
    }

    #[test]
    fn accounts_are_distinct_and_flags_merge() {
        let tx = Transaction::new(vec![
            Instruction::new("prog", vec![AccountMeta::readonly("a")], vec![]),
            Instruction::new(
                "prog",
                vec![AccountMeta::writable("a"), AccountMeta::readonly("b")],
                vec![],
            ),
        ]);
        let accounts = tx.accounts();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].pubkey, "a");
        assert!(accounts[0].is_writable);
        assert!(!accounts[1].is_privileged());
    }

    #[test]
    fn referenced_ids_include_programs_in_first_seen_order() {
        let tx = Transaction::new(vec![
            Instruction::system_transfer("alice", "bob", 1),
            Instruction::system_transfer("alice", "carol", 1),
        ]);
        assert_eq!(
            tx.referenced_ids(),
            vec!["alice", "bob", SYSTEM_PROGRAM_ID, "carol"]
        );
    }

    #[test]
    fn value_prefers_declared_amount() {
        let tx = Transaction::new(vec![Instruction::system_transfer("a", "b", LAMPORTS_PER_SOL * 3)]);
        assert_eq!(tx.value_sol(), 3.0);
        assert_eq!(tx.clone().with_value(5.0).value_sol(), 5.0);
    }

    #[test]
    fn validate_rejects_empty_program_id() {
        let tx = Transaction::new(vec![Instruction::new(" ", vec![], vec![])]);
        assert_eq!(
            tx.validate(),
            Err(TransactionError::EmptyProgramId { index: 0 })
        );
    }

    #[test]
    fn instruction_data_round_trips_as_base64() {
        let json = serde_json::json!({
            "program_id": SYSTEM_PROGRAM_ID,
            "accounts": [{"pubkey": "alice", "is_signer": true, "is_writable": true}],
            "data": "AgAAAADKmjsAAAAA"
        });
        let ix: Instruction = serde_json::from_value(json).unwrap();
        assert_eq!(ix.native_transfer_lamports(), Some(1_000_000_000));
        assert_eq!(
            serde_json::to_value(&ix).unwrap()["data"],
            "AgAAAADKmjsAAAAA"
        );
    }

    #[test]
    fn signer_count_includes_fee_payer() {
        let tx = Transaction::new(vec![Instruction::system_transfer("alice", "bob", 1)])
            .with_fee_payer("payer");
        assert_eq!(tx.signer_count(), 2);
        assert_eq!(Transaction::default().signer_count(), 1);
    }
}
