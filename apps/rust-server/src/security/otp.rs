// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # One-time passcodes
//!
//! Six-digit codes delivered by email, used as the last interactive factor
//! of the security gate.
//!
//! ## Lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | `send_otp` | new code, 10 min expiry, attempts reset. One send per 60 s per email |
//! | wrong code | attempts + 1; after 3 the code is dead until a new send |
//! | right code | record marked verified, purged 30 s later |
//! | expiry | record deleted on the next verify |
//!
//! Only an HMAC-SHA256 digest of the code is stored, keyed with a random
//! per-process key. Emails are normalized (NFKC, trimmed, lowercased) before
//! they are used as store keys.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use lru::LruCache;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;

use super::clock::Clock;
use super::email::{EmailTransport, TransportError};

pub const OTP_DIGITS: usize = 6;
pub const OTP_TTL_SECS: i64 = 10 * 60;
pub const MAX_ATTEMPTS: u32 = 3;
pub const RESEND_INTERVAL_SECS: i64 = 60;
pub const VERIFIED_GRACE_SECS: i64 = 30;

/// Upper bound on concurrently tracked emails in the in-memory store.
pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

const CODE_SPACE: u32 = 1_000_000;
/// Largest multiple of [`CODE_SPACE`] that fits in a `u32`; samples at or
/// above it are redrawn so every code is equally likely.
const CODE_SAMPLE_LIMIT: u32 = (u32::MAX / CODE_SPACE) * CODE_SPACE;

const EMAIL_SUBJECT: &str = "Your GuardianLayer verification code";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("a code was sent recently, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error("verification code could not be delivered: {0}")]
    DeliveryFailed(#[source] TransportError),

    #[error("no verification code has been sent to this address")]
    NoCode,

    #[error("verification code has already been used")]
    AlreadyUsed,

    #[error("verification code has expired")]
    Expired,

    #[error("too many incorrect attempts, request a new code")]
    AttemptsExhausted,

    #[error("incorrect verification code, {remaining} attempt(s) remaining")]
    Mismatch { remaining: u32 },

    #[error("secure random source unavailable")]
    Entropy,
}

/// Stored state for one email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub digest: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub verified: bool,
    /// When set, the record is gone from this instant on.
    pub purge_at: Option<DateTime<Utc>>,
}

impl OtpRecord {
    fn is_purged(&self, now: DateTime<Utc>) -> bool {
        self.purge_at.is_some_and(|at| now >= at)
    }

    /// Code can still be verified.
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.verified && now <= self.expires_at && self.attempts < MAX_ATTEMPTS
    }
}

/// Keyed storage for OTP records. Keys are normalized emails.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn get(&self, email: &str) -> Option<OtpRecord>;
    async fn put(&self, email: &str, record: OtpRecord);
    async fn delete(&self, email: &str);
}

/// Bounded in-process store. The least recently used address is evicted
/// once capacity is reached.
pub struct InMemoryOtpStore {
    records: Mutex<LruCache<String, OtpRecord>>,
}

impl InMemoryOtpStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            records: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryOtpStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_CAPACITY)
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn get(&self, email: &str) -> Option<OtpRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email)
            .cloned()
    }

    async fn put(&self, email: &str, record: OtpRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(email.to_string(), record);
    }

    async fn delete(&self, email: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(email);
    }
}

/// Normalize an email for use as a store key.
pub fn normalize_email(email: &str) -> Result<String, OtpError> {
    let normalized: String = email.nfkc().collect::<String>().trim().to_lowercase();
    let valid = match normalized.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !normalized.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(normalized)
    } else {
        Err(OtpError::InvalidEmail)
    }
}

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    transport: Arc<dyn EmailTransport>,
    clock: Arc<dyn Clock>,
    rng: SystemRandom,
    mac: HmacSha256,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        transport: Arc<dyn EmailTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, OtpError> {
        let rng = SystemRandom::new();
        let mut key = [0u8; 32];
        rng.fill(&mut key).map_err(|_| OtpError::Entropy)?;
        let mac = HmacSha256::new_from_slice(&key).map_err(|_| OtpError::Entropy)?;
        Ok(Self {
            store,
            transport,
            clock,
            rng,
            mac,
        })
    }

    /// Generate a code, store its digest and email it.
    pub async fn send_otp(&self, email: &str) -> Result<(), OtpError> {
        let email = normalize_email(email)?;
        let now = self.clock.now();

        if let Some(existing) = self.current(&email, now).await {
            let elapsed = (now - existing.created_at).num_seconds();
            if elapsed < RESEND_INTERVAL_SECS {
                return Err(OtpError::RateLimited {
                    retry_after_secs: RESEND_INTERVAL_SECS - elapsed,
                });
            }
        }

        let code = self.generate_code()?;
        self.store
            .put(
                &email,
                OtpRecord {
                    digest: self.digest(&code),
                    created_at: now,
                    expires_at: now + Duration::seconds(OTP_TTL_SECS),
                    attempts: 0,
                    verified: false,
                    purge_at: None,
                },
            )
            .await;

        if let Err(e) = self
            .transport
            .send(&email, EMAIL_SUBJECT, &email_body(&code))
            .await
        {
            self.store.delete(&email).await;
            tracing::warn!(error = %e, "OTP delivery failed");
            return Err(OtpError::DeliveryFailed(e));
        }

        tracing::info!("OTP sent");
        Ok(())
    }

    /// Check `code` against the stored digest.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<(), OtpError> {
        let email = normalize_email(email)?;
        let now = self.clock.now();

        let Some(mut record) = self.current(&email, now).await else {
            return Err(OtpError::NoCode);
        };
        if record.verified {
            return Err(OtpError::AlreadyUsed);
        }
        if now > record.expires_at {
            self.store.delete(&email).await;
            return Err(OtpError::Expired);
        }
        if record.attempts >= MAX_ATTEMPTS {
            return Err(OtpError::AttemptsExhausted);
        }

        if !self.matches(&record.digest, code.trim()) {
            record.attempts += 1;
            let remaining = MAX_ATTEMPTS - record.attempts;
            self.store.put(&email, record).await;
            tracing::warn!(remaining, "OTP mismatch");
            return Err(OtpError::Mismatch { remaining });
        }

        record.verified = true;
        record.purge_at = Some(now + Duration::seconds(VERIFIED_GRACE_SECS));
        self.store.put(&email, record).await;
        tracing::info!("OTP verified");
        Ok(())
    }

    /// The address verified a code within the grace window.
    pub async fn is_verified(&self, email: &str) -> bool {
        let Ok(email) = normalize_email(email) else {
            return false;
        };
        let now = self.clock.now();
        self.current(&email, now)
            .await
            .is_some_and(|record| record.verified)
    }

    /// Send a code unless a usable one is already outstanding.
    ///
    /// Returns `true` when a new code was sent.
    pub async fn ensure_sent(&self, email: &str) -> Result<bool, OtpError> {
        let normalized = normalize_email(email)?;
        let now = self.clock.now();
        if self
            .current(&normalized, now)
            .await
            .is_some_and(|record| record.is_live(now))
        {
            return Ok(false);
        }
        self.send_otp(&normalized).await?;
        Ok(true)
    }

    /// Stored record, dropping it if its purge time has passed.
    async fn current(&self, email: &str, now: DateTime<Utc>) -> Option<OtpRecord> {
        let record = self.store.get(email).await?;
        if record.is_purged(now) {
            self.store.delete(email).await;
            return None;
        }
        Some(record)
    }

    fn generate_code(&self) -> Result<String, OtpError> {
        loop {
            let mut buf = [0u8; 4];
            self.rng.fill(&mut buf).map_err(|_| OtpError::Entropy)?;
            let sample = u32::from_le_bytes(buf);
            if sample < CODE_SAMPLE_LIMIT {
                return Ok(format!("{:0width$}", sample % CODE_SPACE, width = OTP_DIGITS));
            }
        }
    }

    fn digest(&self, code: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(code.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn matches(&self, digest: &[u8], code: &str) -> bool {
        let mut mac = self.mac.clone();
        mac.update(code.as_bytes());
        mac.verify_slice(digest).is_ok()
    }
}

fn email_body(code: &str) -> String {
    format!(
        "<p>Your GuardianLayer verification code is <strong>{code}</strong>.</p>\
         <p>It expires in ten minutes. If you did not request it, ignore this email.</p>"
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::security::clock::ManualClock;

    /// Transport that remembers the last message per recipient.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    impl RecordingTransport {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn sends(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        /// The six-digit code in the most recent body.
        pub fn last_code(&self) -> String {
            let sent = self.sent.lock().unwrap();
            let (_, body) = sent.last().expect("no email sent");
            let start = body.find("<strong>").unwrap() + "<strong>".len();
            body[start..start + OTP_DIGITS].to_string()
        }
    }

    #[async_trait]
    impl EmailTransport for RecordingTransport {
        async fn send(&self, to: &str, _subject: &str, body_html: &str) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::NotConfigured);
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body_html.to_string()));
            Ok(())
        }
    }

    fn service() -> (OtpService, Arc<RecordingTransport>, Arc<ManualClock>, Arc<InMemoryOtpStore>) {
        let transport = Arc::new(RecordingTransport::default());
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(InMemoryOtpStore::default());
        let service = OtpService::new(store.clone(), transport.clone(), clock.clone()).unwrap();
        (service, transport, clock, store)
    }

    fn wrong(code: &str) -> String {
        let n: u32 = code.parse().unwrap();
        format!("{:06}", (n + 1) % CODE_SPACE)
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        // Fullwidth letters fold under NFKC.
        assert_eq!(normalize_email("ａｌｉｃｅ@example.com").unwrap(), "alice@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a b@example.com").is_err());
    }

    #[tokio::test]
    async fn send_then_verify_once() {
        let (service, transport, _, _) = service();
        service.send_otp("Alice@Example.com").await.unwrap();
        let code = transport.last_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        service.verify_otp("alice@example.com", &code).await.unwrap();
        assert!(service.is_verified("alice@example.com").await);
        assert!(matches!(
            service.verify_otp("alice@example.com", &code).await,
            Err(OtpError::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn verified_record_is_purged_after_grace() {
        let (service, transport, clock, store) = service();
        service.send_otp("a@example.com").await.unwrap();
        service
            .verify_otp("a@example.com", &transport.last_code())
            .await
            .unwrap();

        clock.advance(Duration::seconds(VERIFIED_GRACE_SECS));
        assert!(!service.is_verified("a@example.com").await);
        assert!(store.is_empty());
        assert!(matches!(
            service.verify_otp("a@example.com", "000000").await,
            Err(OtpError::NoCode)
        ));
    }

    #[tokio::test]
    async fn resend_is_rate_limited() {
        let (service, _, clock, _) = service();
        service.send_otp("a@example.com").await.unwrap();
        clock.advance(Duration::seconds(20));
        match service.send_otp("A@example.com").await {
            Err(OtpError::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, 40),
            other => panic!("expected rate limit, got {other:?}"),
        }
        clock.advance(Duration::seconds(40));
        service.send_otp("a@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn three_failures_exhaust_the_code() {
        let (service, transport, _, _) = service();
        service.send_otp("a@example.com").await.unwrap();
        let code = transport.last_code();
        let bad = wrong(&code);

        for remaining in [2, 1, 0] {
            match service.verify_otp("a@example.com", &bad).await {
                Err(OtpError::Mismatch { remaining: r }) => assert_eq!(r, remaining),
                other => panic!("expected mismatch, got {other:?}"),
            }
        }
        assert!(matches!(
            service.verify_otp("a@example.com", &code).await,
            Err(OtpError::AttemptsExhausted)
        ));
    }

    #[tokio::test]
    async fn code_expires_after_ten_minutes() {
        let (service, transport, clock, store) = service();
        service.send_otp("a@example.com").await.unwrap();
        let code = transport.last_code();

        clock.advance(Duration::seconds(OTP_TTL_SECS + 1));
        assert!(matches!(
            service.verify_otp("a@example.com", &code).await,
            Err(OtpError::Expired)
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn code_still_valid_at_expiry_instant() {
        let (service, transport, clock, _) = service();
        service.send_otp("a@example.com").await.unwrap();
        clock.advance(Duration::seconds(OTP_TTL_SECS));
        service
            .verify_otp("a@example.com", &transport.last_code())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delivery_failure_discards_code() {
        let transport = Arc::new(RecordingTransport::failing());
        let store = Arc::new(InMemoryOtpStore::default());
        let service =
            OtpService::new(store.clone(), transport, Arc::new(ManualClock::default())).unwrap();

        assert!(matches!(
            service.send_otp("a@example.com").await,
            Err(OtpError::DeliveryFailed(_))
        ));
        assert!(store.is_empty());
        assert!(matches!(
            service.verify_otp("a@example.com", "123456").await,
            Err(OtpError::NoCode)
        ));
    }

    #[tokio::test]
    async fn ensure_sent_reuses_live_code() {
        let (service, transport, clock, _) = service();
        assert!(service.ensure_sent("a@example.com").await.unwrap());
        assert!(!service.ensure_sent("a@example.com").await.unwrap());
        assert_eq!(transport.sends(), 1);

        clock.advance(Duration::seconds(OTP_TTL_SECS + 1));
        assert!(service.ensure_sent("a@example.com").await.unwrap());
        assert_eq!(transport.sends(), 2);
    }

    #[tokio::test]
    async fn stored_digest_is_not_the_code() {
        let (service, transport, _, store) = service();
        service.send_otp("a@example.com").await.unwrap();
        let record = store.get("a@example.com").await.unwrap();
        assert_eq!(record.digest.len(), 32);
        assert_ne!(record.digest, transport.last_code().into_bytes());
    }

    #[test]
    fn body_contains_a_single_six_digit_run() {
        let body = email_body("042917");
        let runs: Vec<&str> = body
            .split(|c: char| !c.is_ascii_digit())
            .filter(|s| s.len() == OTP_DIGITS)
            .collect();
        assert_eq!(runs, vec!["042917"]);
    }
}
