use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use stay_payment_engine::{OrderFlowApi, PaymentFlowApi, SqliteDatabase};

use crate::{
    auth::TokenVerifier,
    config::ServerConfig,
    errors::ServerError,
    integrations::{HttpCardGateway, HttpMailer},
    routes::{
        health,
        CreateOrderRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        PayOrderRoute,
        PaymentByIdRoute,
        PaymentHistoryRoute,
        ProcessPaymentRoute,
        RefundPaymentRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let gateway =
        HttpCardGateway::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let mailer = HttpMailer::new(config.mail.clone());
    let srv = HttpServer::new(move || {
        let payments_api = PaymentFlowApi::new(db.clone(), gateway.clone(), mailer.clone());
        let orders_api = OrderFlowApi::new(db.clone(), payments_api.clone(), mailer.clone());
        let verifier = TokenVerifier::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(verifier));
        // Every /api route carries the ACL middleware; /health is the only anonymous route.
        let api_scope = web::scope("/api")
            .service(ProcessPaymentRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(PaymentHistoryRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(PaymentByIdRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(RefundPaymentRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(CreateOrderRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(MyOrdersRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(OrderByIdRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new())
            .service(PayOrderRoute::<SqliteDatabase, HttpCardGateway, HttpMailer>::new());
        app.service(health).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
