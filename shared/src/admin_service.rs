use crate::http::{full_body, make_error_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

/// Liveness and readiness endpoints served on the admin listener.
///
/// `/health` answers as soon as the process accepts connections. `/ready`
/// consults the readiness probe on every call.
pub struct AdminService<F> {
    is_ready: F,
}

impl<F> AdminService<F>
where
    F: Fn() -> bool,
{
    pub fn new(is_ready: F) -> Self {
        Self { is_ready }
    }
}

impl<F> Service<Request<Incoming>> for AdminService<F>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res = route(req.method(), req.uri().path(), || (self.is_ready)());
        Box::pin(async move { Ok(res) })
    }
}

fn route(
    method: &Method,
    path: &str,
    is_ready: impl FnOnce() -> bool,
) -> Response<BoxBody<Bytes, Infallible>> {
    if method != Method::GET && method != Method::HEAD {
        return make_error_response(StatusCode::METHOD_NOT_ALLOWED);
    }

    match path {
        "/health" => Response::new(full_body("ok\n")),
        "/ready" => match is_ready() {
            true => Response::new(full_body("ok\n")),
            false => make_error_response(StatusCode::SERVICE_UNAVAILABLE),
        },
        _ => make_error_response(StatusCode::NOT_FOUND),
    }
}
