//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod payment;
mod repository;

pub use payment::{
    PaymentError, PaymentGateway, ProviderCustomer, ProviderInvoice, ProviderSubscription,
};
pub use repository::ParkingRepository;
