//! # Parking Types
//!
//! Domain types and port traits for the parking management service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (User, ParkingPlan, ParkingActivity, ...)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    AccessToken, AccessTokenId, ActivityId, Authority, Currency, EligibilityId, ExceptionLog,
    ExceptionLogId, MAX_LOG_EVENTS, Money, Page, ParkingActivity, ParkingPlan,
    ParkingSaleActivity, ParkingStatus, PlanEligibleUser, PlanId, PlanSubscription,
    SaleActivityId, SaleFilter, SubscriptionId, User, UserId, filter_sale_activities,
    validate_email, validate_password,
};
pub use dto::*;
pub use error::{AppError, DomainError, ErrorCode, RepoError};
pub use ports::{
    ParkingRepository, PaymentError, PaymentGateway, ProviderCustomer, ProviderInvoice,
    ProviderSubscription,
};
