//! JSON HTTP façade for the on-duty pharmacy lookup.
//!
//! Exposes an axum [`Router`] backed by a [`DutyFinder`] over any
//! [`garde_core::store::PharmacyStore`]. Every route is a `GET`; TLS, auth
//! and rate limiting are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/pharmacy/api", garde_api::api_router(finder.clone()))
//! ```

pub mod duty;
pub mod error;
pub mod health;
pub mod pharmacies;
pub mod view;

use axum::{Router, routing::get};
use garde_core::{finder::DutyFinder, store::PharmacyStore};

pub use error::ApiError;

/// All lookup routes with `finder` already attached as state.
///
/// No state is left to supply, so the router mounts under a parent of any
/// state type.
pub fn api_router<S>(finder: DutyFinder<S>) -> Router<()>
where
  S: PharmacyStore + 'static,
{
  Router::new()
    .route("/health", get(health::handler::<S>))
    // Pharmacies
    .route("/pharmacies", get(pharmacies::list::<S>))
    .route("/pharmacies/nearby", get(pharmacies::nearby::<S>))
    .route("/pharmacies/search", get(pharmacies::search::<S>))
    // Duty roster
    .route("/duty", get(duty::list::<S>))
    .with_state(finder)
}
