// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account risk evaluator.
//!
//! Resolves each distinct account through an [`AccountResolver`] and flags
//! the ones the resolver does not know.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::error::DetectorError;
use super::factor::{kind, RiskFactor, Severity};
use super::programs::KNOWN_PROGRAMS;
use super::transaction::AccountMeta;

/// On-chain facts about an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub exists: bool,
    pub executable: bool,
    pub owner: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ResolverError(pub String);

/// Looks up account state. `Ok(None)` means the account is unknown.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve(&self, pubkey: &str) -> Result<Option<AccountInfo>, ResolverError>;
}

/// Resolver backed by a fixed account table.
///
/// Known programs are always resolvable. In strict mode every other address
/// must be registered; otherwise unregistered addresses are assumed to be
/// existing wallet accounts.
#[derive(Debug, Clone, Default)]
pub struct StaticAccountResolver {
    accounts: HashMap<String, AccountInfo>,
    strict: bool,
}

impl StaticAccountResolver {
    pub fn new(strict: bool) -> Self {
        let mut accounts = HashMap::new();
        for program in KNOWN_PROGRAMS {
            accounts.insert(
                program.id.to_string(),
                AccountInfo {
                    exists: true,
                    executable: true,
                    owner: None,
                },
            );
        }
        Self { accounts, strict }
    }

    pub fn with_account(mut self, pubkey: impl Into<String>, info: AccountInfo) -> Self {
        self.accounts.insert(pubkey.into(), info);
        self
    }
}

#[async_trait]
impl AccountResolver for StaticAccountResolver {
    async fn resolve(&self, pubkey: &str) -> Result<Option<AccountInfo>, ResolverError> {
        if let Some(info) = self.accounts.get(pubkey) {
            return Ok(Some(info.clone()));
        }
        if self.strict {
            Ok(None)
        } else {
            Ok(Some(AccountInfo {
                exists: true,
                executable: false,
                owner: None,
            }))
        }
    }
}

pub struct AccountRiskEvaluator {
    resolver: Arc<dyn AccountResolver>,
}

impl AccountRiskEvaluator {
    pub fn new(resolver: Arc<dyn AccountResolver>) -> Self {
        Self { resolver }
    }

    /// One `unknown_account` factor per distinct account the resolver does
    /// not know or reports as missing.
    pub async fn analyze_accounts(
        &self,
        accounts: &[AccountMeta],
    ) -> Result<Vec<RiskFactor>, DetectorError> {
        let mut seen = HashSet::new();
        let mut risks = Vec::new();

        for meta in accounts {
            if !seen.insert(meta.pubkey.as_str()) {
                continue;
            }
            let info = self
                .resolver
                .resolve(&meta.pubkey)
                .await
                .map_err(|e| DetectorError::Resolver {
                    account: meta.pubkey.clone(),
                    reason: e.to_string(),
                })?;
            if !info.is_some_and(|i| i.exists) {
                risks.push(RiskFactor::new(
                    kind::UNKNOWN_ACCOUNT,
                    Severity::Medium,
                    15,
                    format!("Unknown account {}", meta.pubkey),
                ));
            }
        }

        Ok(risks)
    }
}
