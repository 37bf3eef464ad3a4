//! Access control list middleware for the Stay Payment Server.
//! This middleware can be placed on any route or service.
//!
//! It validates the Bearer token in the `Authorization` header against the server's JWT secret,
//! stores the claims in the request extensions for handlers to extract, and then checks the claims
//! against the required roles for the route. An invalid or missing token yields 401; a valid token
//! without the required roles yields 403.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorInternalServerError, ErrorUnauthorized},
    web,
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use stay_payment_engine::db_types::Role;

use crate::auth::TokenVerifier;

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let verifier = req.app_data::<web::Data<TokenVerifier>>().cloned().ok_or_else(|| {
                log::warn!("No token verifier registered in app data");
                ErrorInternalServerError("No token verifier registered in app data")
            })?;
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| ErrorUnauthorized("Missing credentials"))?;
            let claims = verifier.validate_token(token).map_err(|e| {
                log::debug!("Token validation failed: {e}");
                ErrorUnauthorized(e.to_string())
            })?;
            if !required_roles.iter().all(|role| claims.roles.contains(role)) {
                return Err(ErrorForbidden("Insufficient permissions"));
            }
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
