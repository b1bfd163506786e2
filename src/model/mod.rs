//! Types that represent the core data model: `Transaction`, its `Kind` and `Amount`.
mod amount;
mod transaction;

pub use amount::{group_digits, Amount, AmountError};
pub use transaction::{
    Kind, RowError, Transaction, DEFAULT_CATEGORY, HEADER, MAX_DESCRIPTION_CHARS,
};
