//! Scripted stand-in for the Kubernetes API server.

use std::time::Duration;

use http::{Method, Request, Response, StatusCode};
use kube::{Client, client::Body};
use serde_json::Value;
use tower_test::mock::{self, Handle};

pub struct ApiServer {
    handle: Handle<Request<Body>, Response<Body>>,
}

/// A request the operator sent.
#[derive(Debug)]
pub struct Received {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: Value,
}

/// A client talking to a fresh [`ApiServer`]. Dropping the server makes every
/// further request fail.
pub fn pair() -> (Client, ApiServer) {
    let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    (Client::new(service, "default"), ApiServer { handle })
}

impl ApiServer {
    pub async fn respond(&mut self, status: StatusCode, body: Value) -> Received {
        let next = self.handle.next_request();
        let (request, send) = tokio::time::timeout(Duration::from_secs(5), next)
            .await
            .ok()
            .flatten()
            .expect("the operator sent no request");

        let (parts, content) = request.into_parts();
        let bytes = content.collect_bytes().await.expect("readable request body");
        let body_in = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON request body")
        };

        send.send_response(
            Response::builder()
                .status(status)
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        );

        Received {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().unwrap_or_default().to_owned(),
            body: body_in,
        }
    }

    pub async fn ok(&mut self, body: Value) -> Received {
        self.respond(StatusCode::OK, body).await
    }

    /// Fails the next request the way an overloaded API server would.
    pub async fn unavailable(&mut self) -> Received {
        self.respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Status",
                "status": "Failure",
                "message": "etcdserver: request timed out",
                "reason": "InternalError",
                "code": 500,
            }),
        )
        .await
    }
}
