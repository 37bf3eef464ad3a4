mod card;

pub use card::{luhn_checksum_is_valid, normalize_card_number, CardDetails, CardError};
