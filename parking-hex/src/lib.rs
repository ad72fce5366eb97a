//! # Parking Hex
//!
//! Application service layer and HTTP adapter for the parking service.
//!
//! ## Architecture
//!
//! - `service/` - Application service (orchestrates domain operations)
//! - `inbound/` - HTTP adapter (Axum server)
//! - `openapi` - OpenAPI document served by Swagger UI
//!
//! The service is generic over `R: ParkingRepository` and
//! `P: PaymentGateway`, allowing different adapters to be injected.

pub mod inbound;
pub mod openapi;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use service::ParkingService;
