//! Stay Payment Engine
//!
//! The Stay Payment Engine contains the core logic for the Stay booking storefront's payment gateway:
//! order intake, card payment processing against an external gateway, and reconciliation of payment
//! outcomes onto orders. It is HTTP-framework agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the database
//!    directly. Instead, use the public API provided by the engine. The exception is the data types used
//!    in the database. These are defined in the [`mod@db_types`] module and are public.
//! 2. The collaborator seams ([`mod@traits`]): the storage backend ([`traits::PaymentGatewayDatabase`]),
//!    the external card gateway ([`traits::CardGateway`]) and the email sink
//!    ([`traits::NotificationDispatcher`]). Concrete implementations are injected at process start so
//!    that tests can substitute fakes.
//! 3. The engine public API ([`mod@spe_api`]): [`PaymentFlowApi`] runs the charge lifecycle (balance
//!    pre-flight, gateway submission, audit persistence, notifications) and [`OrderFlowApi`] keeps order
//!    state consistent with payment outcomes.
pub mod db_types;
pub mod helpers;
pub mod spe_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use spe_api::{
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_flow_api::{PaymentFlowApi, MINIMUM_PAYMENT},
    payment_objects,
    OrderFlowError,
    PaymentFlowError,
};
