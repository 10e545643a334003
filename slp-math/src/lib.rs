//! Fixed-point arithmetic for SLP token quantities

pub mod decimal;

pub use decimal::{Decimal, DecimalError, MAX_SCALE};
