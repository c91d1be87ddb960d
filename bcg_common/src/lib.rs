mod money;

pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, STORE_CURRENCY_CODE, STORE_CURRENCY_CODE_LOWER};
pub use secret::Secret;
