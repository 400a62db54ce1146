//! Marketplace operations. Handlers stay thin and call into these with the
//! authenticated user's id.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod entitlement;
pub mod favorites;
pub mod orders;
pub mod reviews;
