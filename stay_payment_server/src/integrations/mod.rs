//! Concrete implementations of the engine's collaborator traits: the card processor client and the
//! transactional mail client.
mod gateway;
mod mailer;

pub use gateway::HttpCardGateway;
pub use mailer::HttpMailer;
