//! Shared fixtures for protocol tests

#![allow(dead_code)]

use std::sync::Arc;

use acb_common::{AcbError, Amount, ManualClock, ProtocolError, UserId, UserProfile, ONE_TOKEN};
use acb_protocol::{LedgerService, ProtocolConfig};

/// Fraction of a token in minor units, `tenths / 10` tokens
pub fn tenths(tenths: u128) -> Amount {
    Amount::new(ONE_TOKEN / 10 * tenths)
}

pub fn tokens(tokens: u128) -> Amount {
    Amount::new(ONE_TOKEN * tokens)
}

pub fn profile(external_id: &str) -> UserProfile {
    UserProfile {
        external_id: external_id.to_string(),
        name: Some(external_id.to_uppercase()),
        ..Default::default()
    }
}

pub struct Harness {
    pub service: Arc<LedgerService>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    pub fn with_config(config: ProtocolConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let service = LedgerService::in_memory(config, clock.clone());
        Self {
            service: Arc::new(service),
            clock,
        }
    }

    pub async fn user(&self, external_id: &str) -> UserId {
        self.service.upsert_user(profile(external_id)).await.unwrap().id
    }

    /// A liquidity provider holding `amount` of the pool
    pub async fn provider(&self, external_id: &str, amount: Amount) -> UserId {
        let user_id = self.user(external_id).await;
        self.service.deposit(user_id, amount, None).await.unwrap();
        user_id
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(chrono::Duration::days(days));
    }
}

/// Unwrap the protocol rejection inside an error
pub fn protocol(err: AcbError) -> ProtocolError {
    match err {
        AcbError::Protocol(inner) => inner,
        other => panic!("expected protocol error, got {other:?}"),
    }
}
