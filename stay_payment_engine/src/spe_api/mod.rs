pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_flow_api;
pub mod payment_objects;


pub use errors::{OrderFlowError, PaymentFlowError};
