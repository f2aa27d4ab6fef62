/// JWT Authentication Middleware
///
/// Fully verifies the Bearer access token (expiry included), optionally
/// requires a role, and injects the claims into request extensions.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::ClaimsEncoder;
use crate::error::{AppError, AuthError};

pub struct JwtMiddleware {
    encoder: ClaimsEncoder,
    required_role: Option<String>,
}

impl JwtMiddleware {
    pub fn new(encoder: ClaimsEncoder) -> Self {
        Self {
            encoder,
            required_role: None,
        }
    }

    /// Reject verified tokens whose role claim is not `role` with 403.
    pub fn require_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            encoder: self.encoder.clone(),
            required_role: self.required_role.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    encoder: ClaimsEncoder,
    required_role: Option<String>,
}

fn reject(err: AppError) -> Error {
    let response = err.error_response();
    actix_web::error::InternalError::from_response(err, response).into()
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);

        let Some(token) = bearer else {
            tracing::warn!("Missing or invalid Authorization header");
            return Box::pin(async move { Err(reject(AuthError::MissingToken.into())) });
        };

        let claims = match self.encoder.verify(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "Access token verification failed");
                return Box::pin(async move { Err(reject(e.into())) });
            }
        };

        if let Some(role) = &self.required_role {
            if !claims.has_role(role) {
                tracing::warn!(user_id = %claims.sub, required_role = %role, "Access token lacks required role");
                return Box::pin(async move { Err(reject(AuthError::Forbidden.into())) });
            }
        }

        tracing::debug!(
            user_id = %claims.sub,
            session_id = %claims.jti,
            "Access token verified"
        );
        req.extensions_mut().insert(claims);

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
