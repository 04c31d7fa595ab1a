use bytes::Bytes;
use gateway::config::Config;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use std::convert::Infallible;
use std::io::Write;
use std::time::Duration;
use tokio::net::TcpListener;

/// Echoes the request body; the path and the tenant come back as headers.
async fn echo(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_owned();
    let org_id = req.headers().get("x-scope-orgid").cloned();
    let body = req.into_body().collect().await.map(|b| b.to_bytes()).unwrap_or_default();

    let mut response = Response::new(Full::new(body));
    response.headers_mut().insert("x-echo-path", path.parse().unwrap());
    if let Some(org_id) = org_id {
        response.headers_mut().insert("x-echo-orgid", org_id);
    }
    Ok(response)
}

async fn start_upstream() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(shared::http::serve(listener, service_fn(echo)));
    port
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

struct Running {
    port: u16,
    admin_port: u16,
}

async fn start_gateway() -> Running {
    let upstream = start_upstream().await;
    let port = free_port().await;
    let admin_port = free_port().await;

    let yaml = format!(
        r#"
gateway:
  listener: {{host: 127.0.0.1, port: {port}}}
  admin_listener: {{host: 127.0.0.1, port: {admin_port}}}
  components:
    default: {{url: "http://127.0.0.1:{upstream}"}}
    query_frontend: {{url: "http://127.0.0.1:{upstream}/qf"}}
  auth:
    tokens:
      - {{token: secret, name: grafana, scopes: ["metrics:read"], tenants: ["team-a", "team-b"]}}
"#
    );
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{yaml}").unwrap();
    let config = Config::from_file(file.path()).unwrap();

    tokio::spawn(proxy::run(config.gateway));

    let client = reqwest::Client::new();
    let ready = format!("http://127.0.0.1:{admin_port}/ready");
    for _ in 0..100 {
        if let Ok(response) = client.get(&ready).send().await
            && response.status() == 200
        {
            return Running { port, admin_port };
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway did not become ready");
}

#[tokio::test]
async fn serves_authorized_queries() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();
    let url = format!(
        "http://127.0.0.1:{}/prometheus/api/v1/query?query=up",
        gateway.port
    );

    let response = client
        .get(&url)
        .basic_auth("team-b", Some("secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-echo-path"], "/qf/prometheus/api/v1/query");
    assert_eq!(response.headers()["x-echo-orgid"], "team-b");

    let response = client
        .get(&url)
        .basic_auth("*", Some("secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-echo-orgid"], "team-a|team-b");

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(
        response.headers()["content-type"],
        "application/json; charset=utf-8"
    );

    let response = client
        .post(format!("http://127.0.0.1:{}/api/v1/push", gateway.port))
        .basic_auth("team-a", Some("secret"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn admin_listener() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://127.0.0.1:{}/health", gateway.admin_port))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok\n");

    let response = client
        .get(format!("http://127.0.0.1:{}/metrics", gateway.port))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-echo-path"], "/metrics");
}
