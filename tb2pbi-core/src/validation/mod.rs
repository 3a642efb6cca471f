//! Validation logic for Tableau to Power BI conversion.

mod validate;

pub use validate::*;
