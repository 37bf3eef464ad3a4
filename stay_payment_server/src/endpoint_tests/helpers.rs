use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test::{self, TestRequest},
    web::{Data, ServiceConfig},
    App,
};
use chrono::Duration;
use log::debug;
use serde::Serialize;
use spg_common::Secret;
use stay_payment_engine::{
    db_types::{Role, Roles},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SqliteDatabase,
};

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::AuthConfig,
};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("endpoint-test-signing-secret-0000".to_string()) }
}

pub fn issue_token(user_id: &str, email: &str, roles: Roles) -> String {
    TokenIssuer::new(&get_auth_config())
        .issue_token(user_id, email, roles, Some(Duration::hours(1)))
        .expect("Failed to sign token")
}

pub fn user_token() -> String {
    issue_token("user-1", "alice@example.com", vec![Role::User])
}

pub fn admin_token() -> String {
    issue_token("admin-1", "ops@stay.example", vec![Role::User, Role::Admin])
}

pub async fn new_test_database() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}

pub async fn get_request<F>(token: &str, path: &str, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    send_request(TestRequest::get().uri(path), token, configure).await
}

pub async fn post_request<F, B>(token: &str, path: &str, body: &B, configure: F) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
    B: Serialize,
{
    send_request(TestRequest::post().uri(path).set_json(body), token, configure).await
}

pub async fn put_request<F, B>(token: &str, path: &str, body: &B, configure: F) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
    B: Serialize,
{
    send_request(TestRequest::put().uri(path).set_json(body), token, configure).await
}

async fn send_request<F>(req: TestRequest, token: &str, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    let mut req = req;
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    let req = req.to_request();
    let app = App::new().app_data(Data::new(TokenVerifier::new(&get_auth_config()))).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
