//! In-process stand-in for the Kubernetes API server
//!
//! Every request the client makes is recorded, and answered by a
//! test-provided closure with a canned status and body.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use http::{Method, Request, Response};
use hyper::Body;
use kube::Client;
use serde_json::{json, Value};

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: Value,
}

impl Recorded {
    pub fn is(&self, method: Method, path: &str) -> bool {
        self.method == method && self.path == path
    }
}

pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    /// Newline-delimited watch events
    pub fn events(events: &[Value]) -> Self {
        Self {
            status: 200,
            body: events.iter().map(|e| format!("{}\n", e)).collect(),
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self::error(404, "NotFound", &format!("\"{}\" not found", name))
    }

    pub fn error(code: u16, reason: &str, message: &str) -> Self {
        Self::status(
            code,
            json!({
                "kind": "Status",
                "apiVersion": "v1",
                "metadata": {},
                "status": "Failure",
                "message": message,
                "reason": reason,
                "code": code
            }),
        )
    }
}

pub struct MockApiServer {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockApiServer {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

/// A client wired to a mock API server answering with `responder`
pub fn mock_client<F>(mut responder: F) -> (Client, MockApiServer)
where
    F: FnMut(&Recorded) -> Reply + Send + 'static,
{
    let (service, mut handle): (_, ApiServerHandle) = tower_test::mock::pair();
    let client = Client::new(service, "default");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();

    tokio::spawn(async move {
        while let Some((request, send)) = handle.next_request().await {
            let (parts, body) = request.into_parts();
            let bytes = hyper::body::to_bytes(body).await.unwrap_or_default();
            let recorded = Recorded {
                method: parts.method.clone(),
                path: parts.uri.path().to_string(),
                query: parts.uri.query().unwrap_or_default().to_string(),
                body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
            };
            let reply = responder(&recorded);
            log.lock().unwrap().push(recorded);
            send.send_response(
                Response::builder()
                    .status(reply.status)
                    .header("content-type", "application/json")
                    .body(Body::from(reply.body))
                    .unwrap(),
            );
        }
    });

    (client, MockApiServer { requests })
}

pub fn list(kind: &str, items: Vec<Value>) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": format!("{}List", kind),
        "metadata": {"resourceVersion": "1"},
        "items": items
    })
}

pub fn node(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": {"name": name, "labels": {"k": "mynode"}}
    })
}

pub fn pod(name: &str, uid: &str, extra_metadata: Value, volumes: Value) -> Value {
    let mut metadata = json!({"name": name, "namespace": "default", "uid": uid});
    if let (Some(base), Some(extra)) = (metadata.as_object_mut(), extra_metadata.as_object()) {
        base.extend(extra.clone());
    }
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": metadata,
        "spec": {"containers": [], "nodeName": "n1", "volumes": volumes},
        "status": {"phase": "Running"}
    })
}

pub fn owned_by(kind: &str) -> Value {
    json!({
        "ownerReferences": [{
            "apiVersion": "apps/v1",
            "kind": kind,
            "name": "owner",
            "uid": "owner-uid",
            "controller": true
        }]
    })
}

pub fn success_status() -> Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Success",
        "message": "",
        "reason": "",
        "code": 201
    })
}
