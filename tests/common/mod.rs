//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use request_observer::config::parse_config;
use request_observer::observation::{
    HandlerError, ObservationHandler, ObservationId, ObservationRegistry, ReceiverContext,
};
use request_observer::{HttpServer, Shutdown};
use tokio::net::TcpListener;

pub const CONFIG: &str = r#"
[observation]
sample_ratio = 1.0

[observability]
metrics_enabled = false

[[routes]]
name = "get-order"
path = "/orders/{id}"
method = "GET"
body = "order"
params = [{ name = "id", markers = ["path"] }]

[[routes]]
name = "order-report"
path = "/orders/{id}/report"
status = 202
body = "report"
delay_ms = 20
params = [
    { name = "id", markers = ["path"] },
    { name = "report", markers = ["suspended"] },
]

[[routes]]
name = "order-ack"
path = "/orders/{id}/ack"
status = 204
delay_ms = 20
params = [
    { name = "id", markers = ["path"] },
    { name = "ack", markers = ["suspended"] },
]

[[routes]]
name = "health"
path = "/health"
body = "up"
"#;

/// What a handler saw when an observation stopped.
#[derive(Debug, Clone)]
pub struct Stopped {
    pub id: ObservationId,
    pub uri: Option<String>,
    pub status: Option<StatusCode>,
    pub outcome: Option<String>,
    pub error_kind: Option<String>,
}

/// Handler double recording started and stopped observations.
#[derive(Clone, Default)]
pub struct StopLog {
    started: Arc<Mutex<Vec<ObservationId>>>,
    stopped: Arc<Mutex<Vec<Stopped>>>,
}

impl StopLog {
    pub fn started(&self) -> Vec<ObservationId> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<Stopped> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn registry(&self) -> ObservationRegistry {
        ObservationRegistry::builder().handler(self.clone()).build()
    }

    /// Wait until `count` observations stopped, or give up after a second.
    pub async fn wait_for_stops(&self, count: usize) -> Vec<Stopped> {
        for _ in 0..100 {
            let stopped = self.stopped();
            if stopped.len() >= count {
                return stopped;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.stopped()
    }
}

impl ObservationHandler for StopLog {
    fn name(&self) -> &'static str {
        "stop-log"
    }

    fn on_start(&self, ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
        if let Some(id) = ctx.id() {
            self.started.lock().unwrap().push(id);
        }
        Ok(())
    }

    fn on_stop(&self, ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
        let tags = ctx.low_cardinality_key_values();
        self.stopped.lock().unwrap().push(Stopped {
            id: ctx.id().expect("stopped observation has an id"),
            uri: tags.get("uri").map(str::to_string),
            status: ctx.response().map(|r| r.status),
            outcome: tags.get("outcome").map(str::to_string),
            error_kind: ctx.error().map(|e| e.kind.clone()),
        });
        Ok(())
    }
}

pub fn server(log: &StopLog) -> HttpServer {
    HttpServer::new(parse_config(CONFIG).unwrap(), log.registry())
}

/// Serve on an ephemeral port; the returned coordinator stops the server.
pub async fn spawn_server(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();

    tokio::spawn(async move {
        server.run(listener, stop).await.unwrap();
    });

    (addr, shutdown)
}
