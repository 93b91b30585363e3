//! Dashboard reports from either real records or generated demo data.
//!
//! # Design
//! Both sources implement `ReportSource`, and callers pick one explicitly:
//! `LiveReports` aggregates rentals and payments fetched from the backend,
//! `DemoReports` fabricates numbers after an artificial delay and never
//! touches the network. Nothing falls back from one to the other.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{RentalApi, Transport};
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::types::{Payment, PaymentStatus, Rental, RentalStatus};

/// Revenue booked in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub period: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: RentalStatus,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRanking {
    pub product_id: String,
    pub name: String,
    pub rentals: u32,
    pub revenue: f64,
}

pub trait ReportSource {
    fn revenue(&self) -> ApiResult<Vec<RevenuePoint>>;
    fn rental_status(&self) -> ApiResult<Vec<StatusCount>>;
    /// At most `limit` products, most rented first.
    fn top_products(&self, limit: usize) -> ApiResult<Vec<ProductRanking>>;
}

// ---------------------------------------------------------------------------
// Live
// ---------------------------------------------------------------------------

/// Reports computed from a snapshot of rentals and payments.
#[derive(Debug, Clone, Default)]
pub struct LiveReports {
    rentals: Vec<Rental>,
    payments: Vec<Payment>,
}

impl LiveReports {
    pub fn new(rentals: Vec<Rental>, payments: Vec<Payment>) -> Self {
        Self { rentals, payments }
    }

    /// Snapshot every rental and payment visible to the current session.
    pub fn fetch<T: Transport>(api: &RentalApi<T>) -> ApiResult<Self> {
        let rentals = api.list_rentals()?;
        let payments = api.list_payments()?;
        debug!(rentals = rentals.len(), payments = payments.len(), "report snapshot loaded");
        Ok(Self::new(rentals, payments))
    }
}

impl ReportSource for LiveReports {
    /// Completed payments summed per `YYYY-MM`, oldest first. Payments
    /// without a timestamp cannot be placed and are skipped.
    fn revenue(&self) -> ApiResult<Vec<RevenuePoint>> {
        let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
        for payment in &self.payments {
            if payment.status != PaymentStatus::Completed {
                continue;
            }
            if let Some(created) = payment.created_at {
                *by_month.entry(created.format("%Y-%m").to_string()).or_default() += payment.amount;
            }
        }
        Ok(by_month
            .into_iter()
            .map(|(period, revenue)| RevenuePoint { period, revenue })
            .collect())
    }

    /// One entry per known status, zero counts included, in workflow order.
    /// Statuses the client does not know follow, sorted by their wire value.
    fn rental_status(&self) -> ApiResult<Vec<StatusCount>> {
        let mut counts: HashMap<&RentalStatus, u32> = HashMap::new();
        for rental in &self.rentals {
            *counts.entry(&rental.status).or_default() += 1;
        }

        let mut unknown: Vec<StatusCount> = counts
            .iter()
            .filter(|(status, _)| !status.is_known())
            .map(|(status, count)| StatusCount {
                status: (*status).clone(),
                count: *count,
            })
            .collect();
        unknown.sort_by(|a, b| a.status.as_str().cmp(b.status.as_str()));

        Ok(RentalStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: status.clone(),
                count: counts.get(status).copied().unwrap_or(0),
            })
            .chain(unknown)
            .collect())
    }

    fn top_products(&self, limit: usize) -> ApiResult<Vec<ProductRanking>> {
        let mut by_product: HashMap<&str, ProductRanking> = HashMap::new();
        for rental in &self.rentals {
            if rental.status == RentalStatus::Cancelled {
                continue;
            }
            let entry = by_product
                .entry(rental.product_id.as_str())
                .or_insert_with(|| ProductRanking {
                    product_id: rental.product_id.clone(),
                    name: rental.product_id.clone(),
                    rentals: 0,
                    revenue: 0.0,
                });
            if let Some(product) = &rental.product {
                entry.name.clone_from(&product.name);
            }
            entry.rentals += 1;
            entry.revenue += rental.total_amount;
        }

        let mut ranked: Vec<ProductRanking> = by_product.into_values().collect();
        ranked.sort_by(|a, b| {
            b.rentals
                .cmp(&a.rentals)
                .then_with(|| b.revenue.total_cmp(&a.revenue))
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}

// ---------------------------------------------------------------------------
// Demo
// ---------------------------------------------------------------------------

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const DEMO_PRODUCTS: [&str; 8] = [
    "Canon EOS R5",
    "DJI Mavic 3",
    "Bosch Hammer Drill",
    "Camping Tent (4p)",
    "Projector 4K",
    "Electric Scooter",
    "PA Speaker Set",
    "Pressure Washer",
];

/// Randomized dashboard data for demos.
#[derive(Debug)]
pub struct DemoReports {
    delay: Duration,
    rng: Mutex<StdRng>,
}

impl DemoReports {
    pub fn new(delay: Duration) -> Self {
        Self::with_rng(delay, StdRng::from_os_rng())
    }

    pub fn seeded(delay: Duration, seed: u64) -> Self {
        Self::with_rng(delay, StdRng::seed_from_u64(seed))
    }

    /// Demo source answering after `config.report_delay`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.report_delay)
    }

    fn with_rng(delay: Duration, rng: StdRng) -> Self {
        Self {
            delay,
            rng: Mutex::new(rng),
        }
    }

    fn generate<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *rng)
    }
}

impl ReportSource for DemoReports {
    fn revenue(&self) -> ApiResult<Vec<RevenuePoint>> {
        Ok(self.generate(|rng| {
            MONTHS
                .iter()
                .map(|month| RevenuePoint {
                    period: (*month).to_string(),
                    revenue: f64::from(rng.random_range(5_000u32..20_000)),
                })
                .collect()
        }))
    }

    fn rental_status(&self) -> ApiResult<Vec<StatusCount>> {
        Ok(self.generate(|rng| {
            RentalStatus::ALL
                .iter()
                .map(|status| StatusCount {
                    status: status.clone(),
                    count: rng.random_range(0..50),
                })
                .collect()
        }))
    }

    fn top_products(&self, limit: usize) -> ApiResult<Vec<ProductRanking>> {
        Ok(self.generate(|rng| {
            let mut ranked: Vec<ProductRanking> = DEMO_PRODUCTS
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let rentals = rng.random_range(10..100);
                    ProductRanking {
                        product_id: format!("demo-{}", i + 1),
                        name: (*name).to_string(),
                        rentals,
                        revenue: f64::from(rentals * rng.random_range(20u32..150)),
                    }
                })
                .collect();
            ranked.sort_by(|a, b| b.rentals.cmp(&a.rentals));
            ranked.truncate(limit);
            ranked
        }))
    }
}
