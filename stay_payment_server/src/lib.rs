//! # Stay Payment Server
//! This module hosts the HTTP layer of the Stay payment gateway. It is responsible for:
//! * Verifying JWT access tokens and enforcing role-based access on every `/api` route.
//! * Translating JSON requests into engine calls and engine outcomes back into JSON responses.
//! * Hosting the concrete card gateway client and the mail API client.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! All business routes live under `/api` and require a Bearer token. The only exception is
//! `/health`, which returns a 200 OK response without authentication.

pub mod auth;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
