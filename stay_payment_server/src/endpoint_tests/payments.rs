use std::sync::atomic::{AtomicU32, Ordering};

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use serde_json::json;
use spg_common::UsdAmount;
use stay_payment_engine::{
    db_types::{PaymentMethod, Role},
    helpers::CardDetails,
    payment_objects::{ChargeInstruction, PaymentResult},
    traits::{ChargeResult, GatewayCardSummary, PaymentMethodInfo, RefundResult},
    PaymentFlowApi,
    SqliteDatabase,
};

use super::{
    helpers::{admin_token, get_request, issue_token, new_test_database, post_request, user_token},
    mocks::{MockCardGw, RecordingDispatcher, SharedMockGateway},
};
use crate::routes::{
    PaymentByIdRoute,
    PaymentHistoryRoute,
    ProcessPaymentRoute,
    RefundPaymentRoute,
    VerifyPaymentRoute,
};

type TestPayments = PaymentFlowApi<SqliteDatabase, SharedMockGateway, RecordingDispatcher>;

fn configure(api: TestPayments) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        // The literal history path must register ahead of the `{id}` pattern.
        cfg.app_data(web::Data::new(api))
            .service(ProcessPaymentRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new())
            .service(PaymentHistoryRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new())
            .service(PaymentByIdRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new())
            .service(RefundPaymentRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new());
    }
}

async fn test_api(gateway: SharedMockGateway) -> (TestPayments, RecordingDispatcher) {
    let db = new_test_database().await;
    let dispatcher = RecordingDispatcher::default();
    (PaymentFlowApi::new(db, gateway, dispatcher.clone()), dispatcher)
}

fn sufficient_funds() -> PaymentMethodInfo {
    PaymentMethodInfo {
        has_sufficient_funds: true,
        currency: "USD".to_string(),
        card: GatewayCardSummary { brand: Some("visa".to_string()), last4: Some("4242".to_string()) },
    }
}

/// A gateway that settles every charge, handing out sequential transaction ids.
fn sequential_gateway(prefix: &str) -> SharedMockGateway {
    let mut mock = MockCardGw::new();
    mock.expect_retrieve_payment_method().returning(|_, _| Ok(sufficient_funds()));
    let prefix = prefix.to_string();
    let counter = AtomicU32::new(0);
    mock.expect_create_charge().returning(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(ChargeResult::Succeeded {
            transaction_id: format!("{prefix}-{n}"),
            card: GatewayCardSummary::default(),
        })
    });
    mock.expect_refund_charge().returning(|_| Ok(RefundResult { refund_id: "re_1".to_string() }));
    SharedMockGateway::new(mock)
}

fn valid_card() -> CardDetails {
    CardDetails {
        card_number: "4242 4242 4242 4242".to_string(),
        exp_month: 12,
        exp_year: 2030,
        cvv: "123".to_string(),
        holder_name: None,
    }
}

fn instruction(user_id: &str, dollars: i64) -> ChargeInstruction {
    ChargeInstruction {
        user_id: user_id.to_string(),
        amount: UsdAmount::from_dollars(dollars),
        currency: "USD".to_string(),
        payment_method: PaymentMethod::CreditCard,
        card: Some(valid_card()),
        payment_method_id: None,
        email: "alice@example.com".to_string(),
        description: None,
    }
}

fn payment_body(amount: f64) -> serde_json::Value {
    json!({
        "amount": amount,
        "cardNumber": "4242 4242 4242 4242",
        "expMonth": 12,
        "expYear": 2030,
        "cvv": "123",
    })
}

async fn wait_for_receipts(dispatcher: &RecordingDispatcher, n: usize) {
    for _ in 0..100 {
        if dispatcher.receipts.lock().unwrap().len() >= n {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("Expected {n} payment confirmation(s) to be dispatched");
}

#[actix_web::test]
async fn process_payment_requires_a_token() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(sequential_gateway("txn")).await;
    let err = post_request("", "/payments/process", &payment_body(150.0), configure(api))
        .await
        .expect_err("Expected error");
    assert_eq!(err, "Missing credentials");
}

#[actix_web::test]
async fn tampered_tokens_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(sequential_gateway("txn")).await;
    let mut token = user_token();
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    let err = post_request(&token, "/payments/process", &payment_body(150.0), configure(api))
        .await
        .expect_err("Expected error");
    assert!(err.starts_with("Access token is invalid."), "unexpected error: {err}");
}

#[actix_web::test]
async fn payments_below_the_minimum_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(sequential_gateway("txn")).await;
    let (status, body) = post_request(&user_token(), "/payments/process", &payment_body(25.0), configure(api))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""code":"below_minimum""#), "unexpected body: {body}");
    assert!(body.contains(r#""minimumAmount":90"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn malformed_card_numbers_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(sequential_gateway("txn")).await;
    let body = json!({
        "amount": 150.0,
        "cardNumber": "1234 5678 9012 3456",
        "expMonth": 12,
        "expYear": 2030,
        "cvv": "123",
    });
    let (status, body) =
        post_request(&user_token(), "/payments/process", &body, configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""code":"invalid_card""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn successful_payments_return_the_transaction_id() {
    let _ = env_logger::try_init().ok();
    let (api, dispatcher) = test_api(sequential_gateway("txn")).await;
    let (status, body) = post_request(&user_token(), "/payments/process", &payment_body(150.0), configure(api))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":true"#), "unexpected body: {body}");
    assert!(body.contains(r#""transactionId":"txn-0""#), "unexpected body: {body}");
    assert!(body.contains(r#""amount":150.0"#), "unexpected body: {body}");
    wait_for_receipts(&dispatcher, 1).await;
    let receipts = dispatcher.receipts.lock().unwrap();
    assert_eq!(receipts[0].email, "alice@example.com");
}

#[actix_web::test]
async fn stored_payment_methods_are_accepted_in_place_of_card_details() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockCardGw::new();
    // The balance pre-flight only applies to raw card details.
    mock.expect_retrieve_payment_method().never();
    mock.expect_create_charge().returning(|request| {
        assert_eq!(request.payment_method_id.as_deref(), Some("pm_123"));
        assert!(request.card.is_none());
        Ok(ChargeResult::Succeeded { transaction_id: "txn_pm".to_string(), card: GatewayCardSummary::default() })
    });
    let (api, _dispatcher) = test_api(SharedMockGateway::new(mock)).await;
    let body = json!({ "amount": 150.0, "paymentMethodId": "pm_123" });
    let (status, body) =
        post_request(&user_token(), "/payments/process", &body, configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""transactionId":"txn_pm""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn a_funding_source_is_required() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(SharedMockGateway::new(MockCardGw::new())).await;
    let body = json!({ "amount": 150.0 });
    let (status, body) =
        post_request(&user_token(), "/payments/process", &body, configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""code":"invalid_request""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn insufficient_funds_yield_a_400() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockCardGw::new();
    mock.expect_retrieve_payment_method().returning(|_, _| {
        Ok(PaymentMethodInfo {
            has_sufficient_funds: false,
            currency: "USD".to_string(),
            card: GatewayCardSummary::default(),
        })
    });
    let (api, _dispatcher) = test_api(SharedMockGateway::new(mock)).await;
    let (status, body) = post_request(&user_token(), "/payments/process", &payment_body(150.0), configure(api))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""code":"insufficient_funds""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn step_up_challenges_pass_the_client_secret_through() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockCardGw::new();
    mock.expect_retrieve_payment_method().returning(|_, _| Ok(sufficient_funds()));
    mock.expect_create_charge().returning(|_| {
        Ok(ChargeResult::RequiresAction {
            transaction_id: "txn_3ds".to_string(),
            client_secret: "cs_secret_123".to_string(),
        })
    });
    let (api, _dispatcher) = test_api(SharedMockGateway::new(mock)).await;
    let (status, body) = post_request(&user_token(), "/payments/process", &payment_body(200.0), configure(api))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""requiresAction":true"#), "unexpected body: {body}");
    assert!(body.contains(r#""clientSecret":"cs_secret_123""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn declined_charges_yield_a_400() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockCardGw::new();
    mock.expect_retrieve_payment_method().returning(|_, _| Ok(sufficient_funds()));
    mock.expect_create_charge().returning(|_| {
        Ok(ChargeResult::Declined { transaction_id: Some("txn_no".to_string()), reason: "Card declined".to_string() })
    });
    let (api, _dispatcher) = test_api(SharedMockGateway::new(mock)).await;
    let (status, body) = post_request(&user_token(), "/payments/process", &payment_body(150.0), configure(api))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""code":"payment_failed""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn verify_reports_the_balance_without_charging() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockCardGw::new();
    mock.expect_retrieve_payment_method().returning(|_, _| Ok(sufficient_funds()));
    mock.expect_create_charge().never();
    let (api, _dispatcher) = test_api(SharedMockGateway::new(mock)).await;
    let (status, body) = post_request(&user_token(), "/payments/verify", &payment_body(150.0), configure(api))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""hasSufficientFunds":true"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn payments_are_only_visible_to_their_owner_or_an_admin() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(sequential_gateway("txn")).await;
    let PaymentResult::Completed { payment } = api.process_payment(instruction("user-1", 150)).await.unwrap() else {
        panic!("Expected a completed payment");
    };
    let path = format!("/payments/{}", payment.id);

    let (status, body) = get_request(&user_token(), &path, configure(api.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""transactionId":"txn-0""#), "unexpected body: {body}");

    let stranger = issue_token("user-2", "bob@example.com", vec![Role::User]);
    let (status, body) = get_request(&stranger, &path, configure(api.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains(r#""code":"forbidden""#), "unexpected body: {body}");

    let (status, _) = get_request(&admin_token(), &path, configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn history_is_paginated_and_scoped_to_the_caller() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(sequential_gateway("txn")).await;
    for dollars in [100, 150, 200] {
        api.process_payment(instruction("user-1", dollars)).await.unwrap();
    }

    let (status, body) = get_request(&user_token(), "/payments/user/history?page=1&limit=2", configure(api.clone()))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""totalPayments":3"#), "unexpected body: {body}");
    assert!(body.contains(r#""totalPages":2"#), "unexpected body: {body}");
    assert!(body.contains(r#""hasNextPage":true"#), "unexpected body: {body}");
    assert!(body.contains(r#""count":2"#), "unexpected body: {body}");

    let stranger = issue_token("user-2", "bob@example.com", vec![Role::User]);
    let (status, body) =
        get_request(&stranger, "/payments/user/history", configure(api.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""totalPayments":0"#), "unexpected body: {body}");

    let (status, body) =
        get_request(&admin_token(), "/payments/user/history", configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""totalPayments":3"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn refunds_are_admin_only() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(sequential_gateway("txn")).await;
    let PaymentResult::Completed { payment } = api.process_payment(instruction("user-1", 150)).await.unwrap() else {
        panic!("Expected a completed payment");
    };
    let path = format!("/payments/{}/refund", payment.id);

    let err =
        post_request(&user_token(), &path, &json!({}), configure(api.clone())).await.expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions");

    let (status, body) =
        post_request(&admin_token(), &path, &json!({}), configure(api.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"refunded""#), "unexpected body: {body}");

    // A second refund must bounce off the status guard.
    let (status, body) = post_request(&admin_token(), &path, &json!({}), configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""code":"refund_not_allowed""#), "unexpected body: {body}");
}
