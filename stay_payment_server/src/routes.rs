//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. For this reason, any long, non-cpu-bound operation (e.g. I/O,
//! database operations, etc.) should be expressed as futures or asynchronous functions, which get executed
//! concurrently by worker threads without blocking.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use serde_json::json;
use stay_payment_engine::{
    db_types::{OrderId, Role},
    order_objects::OrderPaymentResult,
    payment_objects::{PaymentResult, PaymentSearchFilter, SearchPage},
    traits::{CardGateway, NotificationDispatcher, PaymentGatewayDatabase},
    OrderFlowApi,
    PaymentFlowApi,
};

use crate::{
    auth::JwtClaims,
    data_objects::{
        BalanceCheckResponse,
        CardParams,
        HistoryQuery,
        HistoryResponse,
        MoveOrderParams,
        MyOrdersResponse,
        NewOrderParams,
        OrderView,
        Pagination,
        PaymentParams,
        PaymentProcessedResponse,
        PaymentView,
        RequiresActionResponse,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

route!(process_payment => Post "/payments/process" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::User]);
route!(verify_payment => Post "/payments/verify" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::User]);
route!(payment_by_id => Get "/payments/{id}" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::User]);
route!(payment_history => Get "/payments/user/history" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::User]);
route!(refund_payment => Post "/payments/{id}/refund" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::Admin]);
route!(create_order => Post "/orders" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::User]);
route!(my_orders => Get "/orders" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::User]);
route!(order_by_id => Get "/orders/{order_id}" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::User]);
route!(update_order_status => Put "/orders/{order_id}/status" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::Admin]);
route!(pay_order => Post "/orders/{order_id}/pay" impl PaymentGatewayDatabase, CardGateway, NotificationDispatcher where requires [Role::User]);

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------  Payments ----------------------------------------------------

/// Route handler for `POST /api/payments/process`
///
/// Runs one charge attempt for the authenticated user. Failure modes map onto the error vocabulary in
/// [`crate::errors`]; a step-up requirement is a 200 with `requiresAction` set and the client secret.
pub async fn process_payment<B, G, N>(
    claims: JwtClaims,
    body: web::Json<PaymentParams>,
    api: web::Data<PaymentFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let instruction = body.to_instruction(&claims)?;
    debug!("💻️ Processing a {} charge for {}", instruction.amount, claims.sub);
    match api.process_payment(instruction).await? {
        PaymentResult::Completed { payment } => Ok(HttpResponse::Ok().json(PaymentProcessedResponse::from(&payment))),
        PaymentResult::RequiresAction { payment, client_secret } => {
            Ok(HttpResponse::Ok().json(RequiresActionResponse {
                success: true,
                requires_action: true,
                payment_id: payment.id,
                client_secret,
            }))
        },
    }
}

/// Route handler for `POST /api/payments/verify`
///
/// Pre-flight balance check. Nothing is persisted and no charge is attempted.
pub async fn verify_payment<B, G, N>(
    claims: JwtClaims,
    body: web::Json<PaymentParams>,
    api: web::Data<PaymentFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let instruction = body.to_instruction(&claims)?;
    let check = api.verify_funds(&instruction).await?;
    Ok(HttpResponse::Ok().json(BalanceCheckResponse {
        success: true,
        has_sufficient_funds: check.has_sufficient_funds,
        currency: check.currency,
    }))
}

/// Route handler for `GET /api/payments/{id}`
///
/// Only the owning user or an admin may view a payment.
pub async fn payment_by_id<B, G, N>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let id = path.into_inner();
    let payment = api.fetch_payment(id).await?;
    if !claims.can_access_user(&payment.user_id) {
        return Err(ServerError::InsufficientPermissions(format!("Payment {id} belongs to another user")));
    }
    Ok(HttpResponse::Ok().json(PaymentView::from(payment)))
}

/// Route handler for `GET /api/payments/user/history`
///
/// Regular users see their own payments; admins see everyone's.
pub async fn payment_history<B, G, N>(
    claims: JwtClaims,
    query: web::Query<HistoryQuery>,
    api: web::Data<PaymentFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let query = query.into_inner();
    let mut filter = if claims.is_admin() {
        PaymentSearchFilter::default()
    } else {
        PaymentSearchFilter::for_user(&claims.sub)
    };
    filter.status = query.status;
    filter.method = query.method;
    filter.from = query.from;
    filter.until = query.until;
    let page = SearchPage::new(query.page, query.limit);
    let (payments, total) = api.payment_history(filter, page).await?;
    let pagination = Pagination {
        count: payments.len(),
        page: page.page,
        total_pages: page.total_pages(total),
        total_payments: total,
        has_next_page: page.page < page.total_pages(total),
        has_prev_page: page.page > 1 && total > 0,
    };
    let payments = payments.into_iter().map(PaymentView::from).collect();
    Ok(HttpResponse::Ok().json(HistoryResponse { payments, pagination }))
}

/// Route handler for `POST /api/payments/{id}/refund`. Admin only.
pub async fn refund_payment<B, G, N>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let id = path.into_inner();
    info!("💻️ Refund of payment {id} requested by {}", claims.sub);
    let payment = api.refund_payment(id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "payment": PaymentView::from(payment),
    })))
}

// ----------------------------------------------   Orders  ----------------------------------------------------

/// Route handler for `POST /api/orders`
pub async fn create_order<B, G, N>(
    claims: JwtClaims,
    body: web::Json<NewOrderParams>,
    api: web::Data<OrderFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let order = body.to_new_order()?;
    debug!("💻️ New order from {} for {}", claims.sub, order.total_amount);
    let created = api.create_order(order).await?;
    Ok(HttpResponse::Created().json(OrderView::from(created)))
}

/// Route handler for `GET /api/orders`
///
/// Lists the authenticated customer's orders, newest first, with their line items.
pub async fn my_orders<B, G, N>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let orders = api.orders_for_customer(&claims.email).await?;
    let orders: Vec<OrderView> = orders.into_iter().map(OrderView::from).collect();
    Ok(HttpResponse::Ok().json(MyOrdersResponse {
        customer_email: claims.email.clone(),
        total_orders: orders.len(),
        orders,
    }))
}

/// Route handler for `GET /api/orders/{order_id}`
///
/// Only the customer who placed the order or an admin may view it.
pub async fn order_by_id<B, G, N>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let order_id = OrderId(path.into_inner());
    let result = api.fetch_order(&order_id).await?;
    if !claims.can_access_email(&result.order.customer_email) {
        return Err(ServerError::InsufficientPermissions(format!("Order {order_id} belongs to another customer")));
    }
    Ok(HttpResponse::Ok().json(OrderView::from(result)))
}

/// Route handler for `PUT /api/orders/{order_id}/status`. Admin only.
pub async fn update_order_status<B, G, N>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<MoveOrderParams>,
    api: web::Data<OrderFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let order_id = OrderId(path.into_inner());
    let new_status = body.into_inner().status;
    info!("💻️ {} is moving order {order_id} to {new_status}", claims.sub);
    let order = api.update_order_status(&order_id, new_status).await?;
    let items = api.fetch_order(&order.order_id).await?.items;
    Ok(HttpResponse::Ok().json(OrderView::from_parts(order, items)))
}

/// Route handler for `POST /api/orders/{order_id}/pay`
///
/// Charges the order total to the supplied card and reconciles the outcome onto the order.
pub async fn pay_order<B, G, N>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<CardParams>,
    api: web::Data<OrderFlowApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    let order_id = OrderId(path.into_inner());
    let existing = api.fetch_order(&order_id).await?;
    if !claims.can_access_email(&existing.order.customer_email) {
        return Err(ServerError::InsufficientPermissions(format!("Order {order_id} belongs to another customer")));
    }
    match api.pay_order(&order_id, &claims.sub, body.into_inner().into()).await? {
        OrderPaymentResult::Settled { order, payment } => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "order": OrderView::from_parts(order, existing.items),
            "payment": PaymentProcessedResponse::from(&payment),
        }))),
        OrderPaymentResult::RequiresAction { order, payment, client_secret } => {
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "requiresAction": true,
                "order": OrderView::from_parts(order, existing.items),
                "paymentId": payment.id,
                "clientSecret": client_secret,
            })))
        },
    }
}
