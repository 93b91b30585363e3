//! Client core for the rental-equipment backend.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values for every
//! backend endpoint (host-does-IO pattern), plus a blocking `RentalApi`
//! façade that runs the round-trip through a `Transport`.
//!
//! # Design
//! - `RentalClient` holds only the base URL and a `Session`; the bearer
//!   token is read from the session's `TokenStore` on every build.
//! - Responses are normalized in one place: 401/403 clear the token and
//!   publish `SessionEvent::ForceLogout`, unparseable bodies become
//!   `InvalidResponse`, other failures carry the backend's message.
//! - Demo-only behavior (randomized reports, the simulated payment gateway,
//!   email-based role inference) lives in its own modules behind traits so
//!   production code opts in explicitly.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod payment;
pub mod reports;
pub mod session;
pub mod types;

pub use api::{RentalApi, Transport, UreqTransport};
pub use client::RentalClient;
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use payment::{PaymentGateway, PaymentReceipt, PaymentRequest, SimulatedGateway};
pub use reports::{DemoReports, LiveReports, ReportSource};
pub use session::{FileTokenStore, MemoryTokenStore, Session, SessionEvent, SessionEvents, TokenStore};
pub use types::*;
