use crate::upstream::{ProxyBody, RequestBody};
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serves `handler` on an ephemeral local port.
pub async fn start_server<F, Fut>(handler: F) -> u16
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let handler = handler.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler(req).await) }
                });
                if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await
                {
                    eprintln!("Error serving connection: {:?}", err);
                }
            });
        }
    });

    port
}

/// Echoes body and headers back. The request path and query come back in
/// `x-echo-path`. `/status/<code>` answers with that code, `/sleep` stalls
/// for a second.
pub async fn echo(req: Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path_and_query().map(|pq| pq.to_string()).unwrap_or_default();

    if parts.uri.path() == "/sleep" {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    let mut response = Response::new(Full::new(body));
    *response.headers_mut() = parts.headers;
    response.headers_mut().remove(CONTENT_LENGTH);
    response.headers_mut().remove(TRANSFER_ENCODING);
    response
        .headers_mut()
        .insert("x-echo-path", HeaderValue::from_str(&path).unwrap());

    if let Some(code) = parts.uri.path().strip_prefix("/status/") {
        *response.status_mut() = code.parse::<u16>().ok().and_then(|c| StatusCode::from_u16(c).ok()).unwrap_or(StatusCode::OK);
    }
    response
}

pub async fn start_upstream() -> u16 {
    start_server(echo).await
}

pub fn full_request_body(body: impl Into<Bytes>) -> RequestBody {
    shared::http::full_body(body)
}

pub async fn body_of(response: Response<ProxyBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
