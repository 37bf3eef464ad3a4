use actix_web::{http::StatusCode, web, web::ServiceConfig};
use serde_json::json;
use spg_common::UsdAmount;
use stay_payment_engine::{
    db_types::{NewOrder, NewOrderItem, PaymentMethod, Role},
    traits::{ChargeResult, GatewayCardSummary, PaymentMethodInfo, RefundResult},
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

use super::{
    helpers::{admin_token, get_request, issue_token, new_test_database, post_request, put_request, user_token},
    mocks::{MockCardGw, RecordingDispatcher, SharedMockGateway},
};
use crate::routes::{CreateOrderRoute, MyOrdersRoute, OrderByIdRoute, PayOrderRoute, UpdateOrderStatusRoute};

type TestOrders = OrderFlowApi<SqliteDatabase, SharedMockGateway, RecordingDispatcher>;

fn configure(api: TestOrders) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(api))
            .service(CreateOrderRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new())
            .service(MyOrdersRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new())
            .service(OrderByIdRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new())
            .service(PayOrderRoute::<SqliteDatabase, SharedMockGateway, RecordingDispatcher>::new());
    }
}

async fn test_api(gateway: SharedMockGateway) -> (TestOrders, RecordingDispatcher) {
    let db = new_test_database().await;
    let dispatcher = RecordingDispatcher::default();
    let payments = PaymentFlowApi::new(db.clone(), gateway, dispatcher.clone());
    (OrderFlowApi::new(db, payments, dispatcher.clone()), dispatcher)
}

fn settling_gateway(transaction_id: &str) -> SharedMockGateway {
    let mut mock = MockCardGw::new();
    mock.expect_retrieve_payment_method().returning(|_, _| {
        Ok(PaymentMethodInfo {
            has_sufficient_funds: true,
            currency: "USD".to_string(),
            card: GatewayCardSummary { brand: Some("visa".to_string()), last4: Some("4242".to_string()) },
        })
    });
    let txid = transaction_id.to_string();
    mock.expect_create_charge().times(1).returning(move |_| {
        Ok(ChargeResult::Succeeded { transaction_id: txid.clone(), card: GatewayCardSummary::default() })
    });
    mock.expect_refund_charge().returning(|_| Ok(RefundResult { refund_id: "re_1".to_string() }));
    SharedMockGateway::new(mock)
}

fn idle_gateway() -> SharedMockGateway {
    SharedMockGateway::new(MockCardGw::new())
}

fn order_body() -> serde_json::Value {
    json!({
        "customerEmail": "alice@example.com",
        "totalAmount": 450.0,
        "items": [
            { "productId": "room-std", "name": "Standard room, 3 nights", "quantity": 3, "price": 150.0 },
        ],
    })
}

fn card_body() -> serde_json::Value {
    json!({
        "cardNumber": "4242 4242 4242 4242",
        "expMonth": 12,
        "expYear": 2030,
        "cvv": "123",
    })
}

fn new_order(email: &str, dollars: i64) -> NewOrder {
    let item = NewOrderItem {
        product_id: "room-std".to_string(),
        name: "Standard room".to_string(),
        quantity: Some(1),
        price: UsdAmount::from_dollars(dollars),
    };
    NewOrder::new(email.to_string(), UsdAmount::from_dollars(dollars), PaymentMethod::CreditCard)
        .with_items(vec![item])
}

async fn wait_for_order_confirmations(dispatcher: &RecordingDispatcher, n: usize) {
    for _ in 0..100 {
        if dispatcher.order_confirmations.lock().unwrap().len() >= n {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("Expected {n} order confirmation(s) to be dispatched");
}

#[actix_web::test]
async fn creating_an_order_returns_201() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(idle_gateway()).await;
    let (status, body) =
        post_request(&user_token(), "/orders", &order_body(), configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.contains(r#""orderId":"ord-"#), "unexpected body: {body}");
    assert!(body.contains(r#""status":"pending""#), "unexpected body: {body}");
    assert!(body.contains(r#""subtotal":450.0"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn orders_without_items_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(idle_gateway()).await;
    let body = json!({ "customerEmail": "alice@example.com", "totalAmount": 450.0, "items": [] });
    let (status, body) = post_request(&user_token(), "/orders", &body, configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Order items are required"), "unexpected body: {body}");
}

#[actix_web::test]
async fn orders_are_only_visible_to_their_customer_or_an_admin() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(idle_gateway()).await;
    let created = api.create_order(new_order("alice@example.com", 300)).await.unwrap();
    let path = format!("/orders/{}", created.order.order_id.as_str());

    let (status, body) = get_request(&user_token(), &path, configure(api.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""customerEmail":"alice@example.com""#), "unexpected body: {body}");

    let stranger = issue_token("user-2", "bob@example.com", vec![Role::User]);
    let (status, body) = get_request(&stranger, &path, configure(api.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains(r#""code":"forbidden""#), "unexpected body: {body}");

    let (status, _) = get_request(&admin_token(), &path, configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn customers_see_their_own_orders_only() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(idle_gateway()).await;
    api.create_order(new_order("alice@example.com", 300)).await.unwrap();
    api.create_order(new_order("alice@example.com", 450)).await.unwrap();
    api.create_order(new_order("bob@example.com", 200)).await.unwrap();

    let (status, body) = get_request(&user_token(), "/orders", configure(api.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""customerEmail":"alice@example.com""#), "unexpected body: {body}");
    assert!(body.contains(r#""totalOrders":2"#), "unexpected body: {body}");
    assert!(!body.contains("bob@example.com"), "unexpected body: {body}");

    let stranger = issue_token("user-2", "carol@example.com", vec![Role::User]);
    let (status, body) = get_request(&stranger, "/orders", configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""totalOrders":0"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn unknown_orders_yield_a_404() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(idle_gateway()).await;
    let (status, body) =
        get_request(&admin_token(), "/orders/ord-doesnotexist", configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains(r#""code":"not_found""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn only_admins_may_move_order_status() {
    let _ = env_logger::try_init().ok();
    let (api, dispatcher) = test_api(idle_gateway()).await;
    let created = api.create_order(new_order("alice@example.com", 300)).await.unwrap();
    let path = format!("/orders/{}/status", created.order.order_id.as_str());

    let err = put_request(&user_token(), &path, &json!({"status": "completed"}), configure(api.clone()))
        .await
        .expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions");

    let (status, body) = put_request(&admin_token(), &path, &json!({"status": "completed"}), configure(api.clone()))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"completed""#), "unexpected body: {body}");
    wait_for_order_confirmations(&dispatcher, 1).await;

    // Completed orders can only move to refunded.
    let (status, body) = put_request(&admin_token(), &path, &json!({"status": "pending"}), configure(api))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""code":"invalid_transition""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn paying_an_order_settles_it_exactly_once() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(settling_gateway("txn_order")).await;
    let created = api.create_order(new_order("alice@example.com", 450)).await.unwrap();
    let path = format!("/orders/{}/pay", created.order.order_id.as_str());

    let (status, body) =
        post_request(&user_token(), &path, &card_body(), configure(api.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"completed""#), "unexpected body: {body}");
    assert!(body.contains(r#""transactionId":"txn_order""#), "unexpected body: {body}");

    // The times(1) expectation on the gateway mock doubles as proof that no second charge was attempted.
    let (status, body) = post_request(&user_token(), &path, &card_body(), configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains(r#""code":"order_already_paid""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn a_customer_cannot_pay_someone_elses_order() {
    let _ = env_logger::try_init().ok();
    let (api, _dispatcher) = test_api(idle_gateway()).await;
    let created = api.create_order(new_order("alice@example.com", 450)).await.unwrap();
    let path = format!("/orders/{}/pay", created.order.order_id.as_str());

    let stranger = issue_token("user-2", "bob@example.com", vec![Role::User]);
    let (status, body) = post_request(&stranger, &path, &card_body(), configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains(r#""code":"forbidden""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn declined_payments_mark_the_order_failed() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockCardGw::new();
    mock.expect_retrieve_payment_method().returning(|_, _| {
        Ok(PaymentMethodInfo {
            has_sufficient_funds: true,
            currency: "USD".to_string(),
            card: GatewayCardSummary::default(),
        })
    });
    mock.expect_create_charge().returning(|_| {
        Ok(ChargeResult::Declined { transaction_id: Some("txn_no".to_string()), reason: "Card declined".to_string() })
    });
    let (api, _dispatcher) = test_api(SharedMockGateway::new(mock)).await;
    let created = api.create_order(new_order("alice@example.com", 450)).await.unwrap();
    let order_id = created.order.order_id.as_str().to_string();

    let (status, body) = post_request(&user_token(), &format!("/orders/{order_id}/pay"), &card_body(), configure(api.clone()))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""code":"payment_failed""#), "unexpected body: {body}");

    let (status, body) =
        get_request(&user_token(), &format!("/orders/{order_id}"), configure(api)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"failed""#), "unexpected body: {body}");
}
