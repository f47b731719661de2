// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Well-known program registry.

use super::factor::Severity;

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";
pub const STAKE_PROGRAM_ID: &str = "Stake11111111111111111111111111111111111111";
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";
pub const COMPUTE_BUDGET_PROGRAM_ID: &str = "ComputeBudget111111111111111111111111111111";
pub const BPF_UPGRADEABLE_LOADER_ID: &str = "BPFLoaderUpgradeab1e11111111111111111111111";
pub const JUPITER_V6_PROGRAM_ID: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";
pub const ORCA_WHIRLPOOL_PROGRAM_ID: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";
pub const RAYDIUM_AMM_V4_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// Registry entry for a program the analyzer recognizes.
#[derive(Debug, Clone, Copy)]
pub struct KnownProgram {
    pub id: &'static str,
    pub name: &'static str,
    pub verified: bool,
    /// Baseline risk of interacting with the program at all.
    pub baseline: Severity,
    pub description: &'static str,
}

pub const KNOWN_PROGRAMS: &[KnownProgram] = &[
    KnownProgram {
        id: SYSTEM_PROGRAM_ID,
        name: "System Program",
        verified: true,
        baseline: Severity::Low,
        description: "Native SOL transfers and account creation",
    },
    KnownProgram {
        id: TOKEN_PROGRAM_ID,
        name: "Token Program",
        verified: true,
        baseline: Severity::Low,
        description: "SPL token transfers, approvals and mints",
    },
    KnownProgram {
        id: TOKEN_2022_PROGRAM_ID,
        name: "Token-2022 Program",
        verified: true,
        baseline: Severity::Low,
        description: "SPL token extensions program",
    },
    KnownProgram {
        id: ASSOCIATED_TOKEN_PROGRAM_ID,
        name: "Associated Token Account Program",
        verified: true,
        baseline: Severity::Low,
        description: "Creates associated token accounts",
    },
    KnownProgram {
        id: STAKE_PROGRAM_ID,
        name: "Stake Program",
        verified: true,
        baseline: Severity::Low,
        description: "Native staking and delegation",
    },
    KnownProgram {
        id: MEMO_PROGRAM_ID,
        name: "Memo Program",
        verified: true,
        baseline: Severity::Low,
        description: "Attaches a memo to the transaction",
    },
    KnownProgram {
        id: COMPUTE_BUDGET_PROGRAM_ID,
        name: "Compute Budget Program",
        verified: true,
        baseline: Severity::Low,
        description: "Sets compute unit limits and priority fees",
    },
    KnownProgram {
        id: BPF_UPGRADEABLE_LOADER_ID,
        name: "BPF Upgradeable Loader",
        verified: true,
        baseline: Severity::High,
        description: "Deploys and upgrades programs",
    },
    KnownProgram {
        id: JUPITER_V6_PROGRAM_ID,
        name: "Jupiter Aggregator v6",
        verified: true,
        baseline: Severity::Medium,
        description: "Swap routing across liquidity venues",
    },
    KnownProgram {
        id: ORCA_WHIRLPOOL_PROGRAM_ID,
        name: "Orca Whirlpool",
        verified: true,
        baseline: Severity::Medium,
        description: "Concentrated liquidity AMM",
    },
    KnownProgram {
        id: RAYDIUM_AMM_V4_PROGRAM_ID,
        name: "Raydium AMM v4",
        verified: true,
        baseline: Severity::Medium,
        description: "Constant product AMM",
    },
];

pub fn lookup(program_id: &str) -> Option<&'static KnownProgram> {
    KNOWN_PROGRAMS.iter().find(|p| p.id == program_id)
}

/// Program is on the verified allowlist.
pub fn is_verified(program_id: &str) -> bool {
    lookup(program_id).is_some_and(|p| p.verified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_and_unknown() {
        assert_eq!(lookup(SYSTEM_PROGRAM_ID).unwrap().name, "System Program");
        assert!(lookup("Unknown1111111111111111111111111111111111").is_none());
    }

    #[test]
    fn registry_ids_are_unique() {
        for (i, a) in KNOWN_PROGRAMS.iter().enumerate() {
            for b in &KNOWN_PROGRAMS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn allowlist_covers_core_programs() {
        assert!(is_verified(TOKEN_PROGRAM_ID));
        assert!(is_verified(STAKE_PROGRAM_ID));
        assert!(!is_verified("DrainerProgram111111111111111111111111111"));
    }
}
