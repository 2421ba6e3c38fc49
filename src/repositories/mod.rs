//! # Repository Layer
//!
//! SeaORM implementations of the store traits in [`crate::store`], scoped per
//! account.

pub mod account;
pub mod mirror;

pub use account::AccountRepository;
pub use mirror::MirrorRepository;
