//! Defines the integer minor-unit type used for all amounts and balances.

/// An amount of money in integer minor units (cents).
///
/// Balances and history amounts are always whole cents; converting to and
/// from decimal display strings is a front end concern.
pub type Cents = i64;
