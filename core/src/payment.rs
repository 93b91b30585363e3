//! Simulated payment gateway for demos.
//!
//! No real processor is contacted. `SimulatedGateway` waits a fixed delay,
//! then approves roughly nine charges in ten with a generated transaction
//! id. The resulting id is what callers attach to `CreatePayment`.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ClientConfig, DEFAULT_PAYMENT_DELAY};
use crate::error::{ApiError, ApiResult};

/// Probability that a simulated charge is approved.
pub const SUCCESS_RATE: f64 = 0.9;

const SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub rental_id: String,
    pub amount: f64,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub amount: f64,
}

pub trait PaymentGateway {
    fn process(&self, request: &PaymentRequest) -> ApiResult<PaymentReceipt>;
}

#[derive(Debug)]
pub struct SimulatedGateway {
    delay: Duration,
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_DELAY)
    }
}

impl SimulatedGateway {
    pub fn new(delay: Duration) -> Self {
        Self::with_rng(delay, StdRng::from_os_rng())
    }

    pub fn seeded(delay: Duration, seed: u64) -> Self {
        Self::with_rng(delay, StdRng::seed_from_u64(seed))
    }

    /// Gateway answering after `config.payment_delay`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.payment_delay)
    }

    fn with_rng(delay: Duration, rng: StdRng) -> Self {
        Self {
            delay,
            success_rate: SUCCESS_RATE,
            rng: Mutex::new(rng),
        }
    }

    /// Override the approval probability, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_success_rate(mut self, rate: f64) -> Self {
        self.success_rate = rate.clamp(0.0, 1.0);
        self
    }
}

impl PaymentGateway for SimulatedGateway {
    fn process(&self, request: &PaymentRequest) -> ApiResult<PaymentReceipt> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if !rng.random_bool(self.success_rate) {
            warn!(rental_id = %request.rental_id, amount = request.amount, "simulated payment declined");
            return Err(ApiError::PaymentDeclined);
        }

        let suffix: String = (&mut *rng)
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();
        let transaction_id = format!("TXN_{}_{suffix}", Utc::now().timestamp_millis());
        info!(rental_id = %request.rental_id, %transaction_id, "simulated payment approved");

        Ok(PaymentReceipt {
            transaction_id,
            amount: request.amount,
        })
    }
}

/// True if `id` has the `TXN_<millis>_<uppercase alphanumerics>` shape.
pub fn is_transaction_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("TXN_") else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('_') else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
