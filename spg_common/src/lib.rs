mod usd;

mod helpers;
mod secret;

pub use helpers::parse_boolean_flag;
pub use secret::Secret;
pub use usd::{MoneyParseError, UsdAmount, USD_CURRENCY_CODE, USD_CURRENCY_CODE_LOWER};
