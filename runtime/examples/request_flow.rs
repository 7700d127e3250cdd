//! Request flow example
//!
//! Walks one directive through the full lifecycle using mock collaborators:
//! registration, PENDING emission, transport, classification and cleanup.

use reqcycle_core::directive::{Action, RequestDirective};
use reqcycle_core::lifecycle::Descriptor;
use reqcycle_core::routes::StatusRoutes;
use reqcycle_core::transport::{Outcome, Response, TransportConfig};
use reqcycle_runtime::dispatcher::{Intercepted, RequestDispatcher};
use reqcycle_testing::{CollectingSink, FixedState, MockTransport};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_flow=debug,reqcycle_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Request Flow Example: reqcycle pipeline ===\n");

    let transport = MockTransport::new().respond(Response::new(200, json!({"job": "done"})));
    let sink = CollectingSink::new();
    let dispatcher = RequestDispatcher::new(
        transport,
        FixedState::new(json!({"user": "u-1"})),
        sink.clone(),
    );

    let directive: RequestDirective<Value> = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs/1"))
        .namespace("jobs")
        .concurrent(false)
        .on_pending(Descriptor::new("JOB_REQUESTED"))
        .on_fulfilled(
            Descriptor::new("JOB_LOADED").with_computed(|outcome, _directive, _state| {
                json!({"status": outcome.and_then(Outcome::status)})
            }),
        )
        .status_routes(StatusRoutes::new().on(vec![500, 502, 503], Descriptor::new("SERVER_ERR")))
        .build();

    println!(">>> Intercepting a request directive");
    match dispatcher.intercept(Action::request(directive)) {
        Ok(Intercepted::InFlight(in_flight)) => {
            println!("registered request {}", in_flight.request_id());
            println!("in-flight requests: {}", dispatcher.active_requests());
            match in_flight.await {
                Ok(settled) => println!("settled: {settled:?}"),
                Err(err) => println!("failed: {err}"),
            }
        }
        Ok(Intercepted::Forwarded(_)) => println!("action was not a request; forwarded"),
        Err(err) => println!("rejected synchronously: {err}"),
    }

    println!("\nEmitted events, in order:");
    for event in sink.events() {
        println!(
            "  {} (requestId {}) payload={:?}",
            event.event_type, event.request_id, event.payload
        );
    }

    println!("\nin-flight requests after settlement: {}", dispatcher.active_requests());
}
