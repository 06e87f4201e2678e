// core.rs splits chain storage from segment validation.
pub mod chain;
pub mod validation;

pub use chain::*;
pub use validation::*;
