mod twd;

pub mod helpers;
pub mod op;
mod secret;

pub use secret::Secret;
pub use twd::{Twd, TwdConversionError, SETTLEMENT_CURRENCY};
