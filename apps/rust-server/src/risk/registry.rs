// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scam denylist and suspicious-pattern registry.
//!
//! The registry holds an immutable [`ScamDatabase`] snapshot behind an
//! `RwLock<Arc<_>>`. Readers clone the `Arc` once per analysis pass and work
//! against that snapshot; writers build a new snapshot and swap it in. A
//! report landing mid-analysis is picked up by the next pass.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Patterns loaded when no configuration overrides them.
pub const DEFAULT_SUSPICIOUS_PATTERNS: &[&str] = &[r"(?i)drain", r"(?i)phish", r"(?i)airdrop"];

/// Errors raised by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid suspicious pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("scam address must not be empty")]
    EmptyAddress,

    #[error("scam registry lock poisoned")]
    Poisoned,
}

/// A community or operator report of a malicious address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScamReport {
    pub address: String,
    pub evidence: String,
    pub reported_at: DateTime<Utc>,
}

/// Counters exposed for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RegistryStats {
    pub addresses: usize,
    pub patterns: usize,
    pub malicious_programs: usize,
    pub reports: usize,
}

/// One immutable view of the threat intelligence.
#[derive(Debug, Clone, Default)]
pub struct ScamDatabase {
    addresses: HashSet<String>,
    patterns: Vec<Regex>,
    malicious_programs: HashSet<String>,
    reports: Vec<ScamReport>,
}

impl ScamDatabase {
    pub fn is_known_scam(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn is_malicious_program(&self, program_id: &str) -> bool {
        self.malicious_programs.contains(program_id)
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    pub fn reports(&self) -> &[ScamReport] {
        &self.reports
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            addresses: self.addresses.len(),
            patterns: self.patterns.len(),
            malicious_programs: self.malicious_programs.len(),
            reports: self.reports.len(),
        }
    }

    fn add_patterns(&mut self, patterns: Vec<Regex>) {
        for pattern in patterns {
            if !self.patterns.iter().any(|p| p.as_str() == pattern.as_str()) {
                self.patterns.push(pattern);
            }
        }
    }
}

/// Shared, copy-on-write scam registry.
#[derive(Debug, Default)]
pub struct ScamRegistry {
    snapshot: RwLock<Arc<ScamDatabase>>,
}

impl ScamRegistry {
    /// Registry seeded with [`DEFAULT_SUSPICIOUS_PATTERNS`].
    pub fn new() -> Self {
        let patterns: Vec<String> = DEFAULT_SUSPICIOUS_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        match Self::with_entries(Vec::new(), &patterns, Vec::new()) {
            Ok(registry) => registry,
            Err(_) => Self::default(),
        }
    }

    /// Registry seeded from configuration.
    pub fn with_entries(
        addresses: Vec<String>,
        patterns: &[String],
        malicious_programs: Vec<String>,
    ) -> Result<Self, RegistryError> {
        let mut db = ScamDatabase::default();
        db.addresses.extend(clean(addresses));
        db.add_patterns(compile_patterns(patterns)?);
        db.malicious_programs.extend(clean(malicious_programs));
        Ok(Self {
            snapshot: RwLock::new(Arc::new(db)),
        })
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Result<Arc<ScamDatabase>, RegistryError> {
        self.snapshot
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| RegistryError::Poisoned)
    }

    /// Append addresses and patterns to the denylist.
    ///
    /// Patterns are compiled before anything is swapped in, so an invalid
    /// pattern leaves the registry untouched.
    pub fn update_scam_database(
        &self,
        addresses: Vec<String>,
        patterns: &[String],
    ) -> Result<RegistryStats, RegistryError> {
        let compiled = compile_patterns(patterns)?;
        self.replace(|db| {
            db.addresses.extend(clean(addresses));
            db.add_patterns(compiled);
        })
    }

    /// Record a report and denylist the address.
    pub fn report_scam(
        &self,
        address: &str,
        evidence: &str,
    ) -> Result<ScamReport, RegistryError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(RegistryError::EmptyAddress);
        }
        let report = ScamReport {
            address: address.to_string(),
            evidence: evidence.trim().to_string(),
            reported_at: Utc::now(),
        };
        let stored = report.clone();
        self.replace(move |db| {
            db.addresses.insert(stored.address.clone());
            db.reports.push(stored);
        })?;
        Ok(report)
    }

    pub fn reports(&self) -> Result<Vec<ScamReport>, RegistryError> {
        Ok(self.snapshot()?.reports().to_vec())
    }

    pub fn stats(&self) -> Result<RegistryStats, RegistryError> {
        Ok(self.snapshot()?.stats())
    }

    fn replace(
        &self,
        update: impl FnOnce(&mut ScamDatabase),
    ) -> Result<RegistryStats, RegistryError> {
        let mut guard = self.snapshot.write().map_err(|_| RegistryError::Poisoned)?;
        let mut next = ScamDatabase::clone(&guard);
        update(&mut next);
        let stats = next.stats();
        *guard = Arc::new(next);
        Ok(stats)
    }
}

fn clean(values: Vec<String>) -> impl Iterator<Item = String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, RegistryError> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            Regex::new(p).map_err(|source| RegistryError::InvalidPattern {
                pattern: p.to_string(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_has_default_patterns() {
        let registry = ScamRegistry::new();
        let stats = registry.stats().unwrap();
        assert_eq!(stats.patterns, DEFAULT_SUSPICIOUS_PATTERNS.len());
        assert_eq!(stats.addresses, 0);
    }

    #[test]
    fn update_appends_addresses_and_patterns() {
        let registry = ScamRegistry::new();
        let stats = registry
            .update_scam_database(
                vec!["Bad1".into(), "  ".into(), "Bad2".into()],
                &["^evil".to_string()],
            )
            .unwrap();
        assert_eq!(stats.addresses, 2);
        assert_eq!(stats.patterns, DEFAULT_SUSPICIOUS_PATTERNS.len() + 1);
        assert!(registry.snapshot().unwrap().is_known_scam("Bad2"));
    }

    #[test]
    fn invalid_pattern_leaves_registry_unchanged() {
        let registry = ScamRegistry::new();
        let err = registry
            .update_scam_database(vec!["Bad1".into()], &["(unclosed".to_string()])
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPattern { .. }));
        assert!(!registry.snapshot().unwrap().is_known_scam("Bad1"));
    }

    #[test]
    fn report_scam_denylists_address() {
        let registry = ScamRegistry::new();
        let report = registry.report_scam(" Scammer1 ", "phishing site").unwrap();
        assert_eq!(report.address, "Scammer1");
        assert!(registry.snapshot().unwrap().is_known_scam("Scammer1"));
        assert_eq!(registry.reports().unwrap().len(), 1);
        assert!(matches!(
            registry.report_scam("", "x"),
            Err(RegistryError::EmptyAddress)
        ));
    }

    #[test]
    fn held_snapshot_is_not_affected_by_later_writes() {
        let registry = ScamRegistry::new();
        let before = registry.snapshot().unwrap();
        registry.report_scam("Late1", "reported later").unwrap();
        assert!(!before.is_known_scam("Late1"));
        assert!(registry.snapshot().unwrap().is_known_scam("Late1"));
    }

    #[test]
    fn duplicate_patterns_are_not_added_twice() {
        let registry = ScamRegistry::new();
        registry
            .update_scam_database(vec![], &[DEFAULT_SUSPICIOUS_PATTERNS[0].to_string()])
            .unwrap();
        assert_eq!(
            registry.stats().unwrap().patterns,
            DEFAULT_SUSPICIOUS_PATTERNS.len()
        );
    }
}
