// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Biometric authentication seam.
//!
//! Platform biometrics live on the signing device. The service only sees
//! the outcome through a [`BiometricAuthenticator`].

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BiometricAssertion {
    pub success: bool,
    pub credential_id: Option<String>,
    pub error: Option<String>,
}

impl BiometricAssertion {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            credential_id: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn authenticate(&self) -> BiometricAssertion;
}

/// No platform authenticator attached. Any biometric request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBiometric;

#[async_trait]
impl BiometricAuthenticator for UnavailableBiometric {
    async fn is_available(&self) -> bool {
        false
    }

    async fn authenticate(&self) -> BiometricAssertion {
        BiometricAssertion::failed("no platform authenticator attached")
    }
}
