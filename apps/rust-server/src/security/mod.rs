// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multi-factor security gate and its collaborators.

pub mod biometric;
pub mod clock;
pub mod email;
pub mod gate;
pub mod otp;
pub mod pin;
pub mod timelock;

pub use biometric::{BiometricAssertion, BiometricAuthenticator, UnavailableBiometric};
pub use clock::{Clock, ManualClock, SystemClock};
pub use email::{EmailTransport, HttpEmailTransport, TransportError, UnconfiguredEmailTransport};
pub use gate::{
    GateDecision, GateFailure, GateOutcome, GateStage, SecurityGate, SecurityOptions, StageRecord,
};
pub use otp::{InMemoryOtpStore, OtpError, OtpService, OtpStore};
pub use pin::{DisabledPinVerifier, HashedPinVerifier, PinVerifier};
pub use timelock::{
    PendingTransaction, TimeLockEntry, TimeLockError, TimeLockScheduler, TimeLockStatus,
};
