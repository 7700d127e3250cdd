//! End-to-end dispatcher behavior: lifecycle emission, concurrency control,
//! status routing, polling and bypass mode, driven through mock
//! collaborators.

#![allow(clippy::expect_used, clippy::panic)]

use reqcycle_core::directive::{Action, PollSpec, RequestDirective};
use reqcycle_core::error::RequestError;
use reqcycle_core::event::Event;
use reqcycle_core::lifecycle::Descriptor;
use reqcycle_core::routes::StatusRoutes;
use reqcycle_core::transport::{Outcome, Response, TransportConfig};
use reqcycle_runtime::dispatcher::{InFlight, Intercepted, RequestDispatcher, Settled};
use reqcycle_testing::{CollectingSink, FixedState, MockTransport};
use serde_json::{Value, json};
use std::time::Duration;

type Dispatcher = RequestDispatcher<MockTransport, FixedState<Value>, CollectingSink>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("reqcycle_runtime=debug")
        .with_test_writer()
        .try_init();
}

fn dispatcher(transport: MockTransport, sink: CollectingSink) -> Dispatcher {
    RequestDispatcher::new(transport, FixedState::new(json!({"user": "u-1"})), sink)
}

fn in_flight(dispatcher: &Dispatcher, directive: RequestDirective<Value>) -> InFlight {
    match dispatcher.intercept(Action::request(directive)) {
        Ok(Intercepted::InFlight(in_flight)) => in_flight,
        Ok(Intercepted::Forwarded(_)) => panic!("request action was forwarded"),
        Err(err) => panic!("intercept failed: {err}"),
    }
}

fn events_for(sink: &CollectingSink, request_id: reqcycle_core::event::RequestId) -> Vec<Event> {
    sink.events()
        .into_iter()
        .filter(|event| event.request_id == request_id)
        .collect()
}

#[tokio::test]
async fn pending_then_fulfilled_with_matching_request_ids() {
    init_tracing();
    let transport = MockTransport::new().respond(Response::new(200, json!({"id": 7})));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs/7"))
        .on_pending(Descriptor::new("JOB_REQUESTED"))
        .on_fulfilled(
            Descriptor::new("JOB_LOADED")
                .with_computed(|outcome, _directive, _state| {
                    json!({"body": outcome.and_then(|o| match o {
                        Outcome::Single(r) => Some(r.body.clone()),
                        Outcome::Batch(_) => None,
                    })})
                }),
        )
        .build();

    let request = in_flight(&dispatcher, directive);
    let settled = request.await.expect("request should settle");

    assert_eq!(settled, Settled::Emitted);
    assert_eq!(sink.types(), vec!["JOB_REQUESTED", "JOB_LOADED"]);

    let events = sink.events();
    assert_eq!(events[0].request_id, events[1].request_id);
    assert_eq!(events[1].payload, Some(json!({"body": {"id": 7}})));
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test]
async fn pending_is_emitted_before_intercept_returns() {
    let transport = MockTransport::new().always(Response::new(200, Value::Null));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs"))
        .on_pending(Descriptor::new("JOB_REQUESTED"))
        .on_fulfilled(Descriptor::new("JOB_LOADED"))
        .build();

    let request = in_flight(&dispatcher, directive);
    // no await yet: registration and PENDING already happened
    assert_eq!(sink.types(), vec!["JOB_REQUESTED"]);
    assert_eq!(dispatcher.active_requests(), 1);

    let _ = request.await.expect("request should settle");
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn in_flight_future_stays_pending_until_the_transport_settles() {
    let transport = MockTransport::new()
        .always(Response::new(200, Value::Null))
        .with_delay(Duration::from_millis(20));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs"))
        .on_fulfilled(Descriptor::new("JOB_LOADED"))
        .build();

    let mut request = tokio_test::task::spawn(in_flight(&dispatcher, directive));
    tokio_test::assert_pending!(request.poll());
    assert_eq!(dispatcher.active_requests(), 1);

    tokio::time::advance(Duration::from_millis(25)).await;
    assert!(request.is_woken());
    let settled = tokio_test::assert_ready!(request.poll());
    assert_eq!(settled.expect("request should settle"), Settled::Emitted);
    assert_eq!(sink.types(), vec!["JOB_LOADED"]);
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test]
async fn rejected_event_carries_the_failure_response() {
    let transport = MockTransport::new().fail(RequestError::transport_with_response(
        "bad gateway",
        Response::new(502, json!({"reason": "upstream"})),
    ));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs"))
        .on_rejected(
            Descriptor::new("JOB_FAILED").with_computed(|outcome, _directive, _state| {
                json!({"status": outcome.and_then(Outcome::status)})
            }),
        )
        .build();

    let settled = in_flight(&dispatcher, directive)
        .await
        .expect("failure is converted into events");
    assert_eq!(settled, Settled::Emitted);
    assert_eq!(sink.types(), vec!["JOB_FAILED"]);
    assert_eq!(sink.events()[0].payload, Some(json!({"status": 502})));
}

#[tokio::test]
async fn status_route_overrides_success_and_failure_alike() {
    let routes = || {
        StatusRoutes::new().on(
            vec![500, 502, 503],
            Descriptor::new("SERVER_ERR").with_static(json!({"retryable": true})),
        )
    };
    let base = |transport: MockTransport, sink: &CollectingSink| {
        let dispatcher = dispatcher(transport, sink.clone());
        let directive = RequestDirective::builder()
            .options(TransportConfig::get("https://api.example.com/jobs"))
            .on_fulfilled(Descriptor::new("JOB_LOADED"))
            .on_rejected(Descriptor::new("JOB_FAILED"))
            .status_routes(routes())
            .build();
        in_flight(&dispatcher, directive)
    };

    // success branch resolving with a 502 body
    let sink = CollectingSink::new();
    let transport = MockTransport::new().respond(Response::new(502, Value::Null));
    base(transport, &sink).await.expect("settles via events");
    assert_eq!(sink.types(), vec!["SERVER_ERR"]);

    // failure branch carrying a 502 response
    let sink = CollectingSink::new();
    let transport = MockTransport::new().fail(RequestError::transport_with_response(
        "bad gateway",
        Response::new(502, Value::Null),
    ));
    base(transport, &sink).await.expect("settles via events");
    assert_eq!(sink.types(), vec!["SERVER_ERR"]);
    assert_eq!(sink.events()[0].payload, Some(json!({"retryable": true})));
}

#[tokio::test]
async fn bypass_mode_resolves_raw_and_emits_nothing() {
    let transport = MockTransport::new().respond(Response::new(200, json!({"id": 7})));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs/7"))
        .build();

    let settled = in_flight(&dispatcher, directive)
        .await
        .expect("bypass resolves with the raw outcome");
    assert_eq!(
        settled,
        Settled::Bypassed(Outcome::Single(Response::new(200, json!({"id": 7}))))
    );
    assert!(sink.is_empty());
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test]
async fn bypass_mode_rejects_with_the_raw_error() {
    let transport = MockTransport::new().fail(RequestError::transport("connection refused"));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs"))
        .build();

    let result = in_flight(&dispatcher, directive).await;
    assert!(matches!(result, Err(RequestError::Transport { .. })));
    assert!(sink.is_empty());
    // cleanup still ran
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_sibling_emits_exactly_one_cancelled_event() {
    init_tracing();
    let transport = MockTransport::new()
        .always(Response::new(200, Value::Null))
        .with_delay(Duration::from_millis(20));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = || {
        RequestDirective::builder()
            .options(TransportConfig::get("https://api.example.com/search"))
            .namespace("search")
            .concurrent(false)
            .on_fulfilled(Descriptor::new("SEARCH_LOADED"))
            .on_cancelled(Descriptor::new("SEARCH_CANCELLED"))
            .build()
    };

    // A registers first; B's registration flips A's ledger status
    let a = in_flight(&dispatcher, directive());
    let b = in_flight(&dispatcher, directive());
    let a_id = a.request_id();
    let b_id = b.request_id();

    let a_settled = a.await.expect("cancellation settles via events");
    let b_settled = b.await.expect("winner settles via events");
    assert_eq!(a_settled, Settled::Emitted);
    assert_eq!(b_settled, Settled::Emitted);

    let a_types: Vec<String> = events_for(&sink, a_id)
        .iter()
        .map(|e| e.event_type.clone())
        .collect();
    let b_types: Vec<String> = events_for(&sink, b_id)
        .iter()
        .map(|e| e.event_type.clone())
        .collect();
    assert_eq!(a_types, vec!["SEARCH_CANCELLED"]);
    assert_eq!(b_types, vec!["SEARCH_LOADED"]);
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_without_descriptor_falls_back_to_default_type() {
    let transport = MockTransport::new()
        .always(Response::new(200, Value::Null))
        .with_delay(Duration::from_millis(20));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = || {
        RequestDirective::builder()
            .options(TransportConfig::get("https://api.example.com/search"))
            .namespace("search")
            .concurrent(false)
            .on_fulfilled(Descriptor::new("SEARCH_LOADED"))
            .build()
    };

    let a = in_flight(&dispatcher, directive());
    let b = in_flight(&dispatcher, directive());
    let a_id = a.request_id();

    let _ = a.await.expect("cancellation settles via events");
    let _ = b.await.expect("winner settles via events");

    let a_types: Vec<String> = events_for(&sink, a_id)
        .iter()
        .map(|e| e.event_type.clone())
        .collect();
    assert_eq!(a_types, vec!["CANCELLED"]);
}

#[tokio::test]
async fn generic_namespace_requests_never_cancel_each_other() {
    let transport = MockTransport::new().always(Response::new(200, Value::Null));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = || {
        RequestDirective::builder()
            .options(TransportConfig::get("https://api.example.com/misc"))
            .concurrent(false)
            .on_fulfilled(Descriptor::new("LOADED"))
            .build()
    };

    let a = in_flight(&dispatcher, directive());
    let b = in_flight(&dispatcher, directive());
    let _ = a.await.expect("settles");
    let _ = b.await.expect("settles");

    assert_eq!(sink.types(), vec!["LOADED", "LOADED"]);
}

#[tokio::test]
async fn settled_is_emitted_after_the_terminal_event() {
    let transport = MockTransport::new().respond(Response::new(200, json!({"n": 1})));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs"))
        .on_fulfilled(Descriptor::new("JOB_LOADED"))
        .on_settled(
            Descriptor::new("JOB_SETTLED").with_computed(|outcome, _directive, _state| {
                json!({"status": outcome.and_then(Outcome::status)})
            }),
        )
        .build();

    let _ = in_flight(&dispatcher, directive).await.expect("settles");
    assert_eq!(sink.types(), vec!["JOB_LOADED", "JOB_SETTLED"]);
    assert_eq!(sink.events()[1].payload, Some(json!({"status": 200})));
}

#[tokio::test]
async fn settled_alone_still_gates_emission_on() {
    let transport = MockTransport::new().respond(Response::new(200, Value::Null));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs"))
        .on_settled(Descriptor::new("JOB_SETTLED"))
        .build();

    let settled = in_flight(&dispatcher, directive).await.expect("settles");
    assert_eq!(settled, Settled::Emitted);
    assert_eq!(sink.types(), vec!["JOB_SETTLED"]);
}

#[tokio::test]
async fn missing_options_fail_synchronously() {
    let transport = MockTransport::new();
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive: RequestDirective<Value> = RequestDirective::builder()
        .on_fulfilled(Descriptor::new("LOADED"))
        .build();

    let result = dispatcher.intercept(Action::request(directive));
    assert!(matches!(result, Err(RequestError::Config(_))));
    assert!(sink.is_empty());
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test]
async fn non_request_actions_are_forwarded_unchanged() {
    let transport = MockTransport::new();
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let result = dispatcher.intercept(Action::Other(json!({"type": "UI_TICK"})));
    match result {
        Ok(Intercepted::Forwarded(Action::Other(value))) => {
            assert_eq!(value, json!({"type": "UI_TICK"}));
        }
        _ => panic!("expected the action to be forwarded"),
    }
    assert!(sink.is_empty());
}

#[tokio::test]
async fn batch_options_settle_together() {
    let transport = MockTransport::new()
        .respond(Response::new(200, json!(1)))
        .respond(Response::new(201, json!(2)));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport.clone(), sink.clone());

    let directive = RequestDirective::builder()
        .options(vec![
            TransportConfig::get("https://api.example.com/a"),
            TransportConfig::get("https://api.example.com/b"),
        ])
        .build();

    let settled = in_flight(&dispatcher, directive).await.expect("settles");
    assert_eq!(
        settled,
        Settled::Bypassed(Outcome::Batch(vec![
            Response::new(200, json!(1)),
            Response::new(201, json!(2)),
        ]))
    );
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn batch_failure_rejects_the_whole_batch() {
    let transport = MockTransport::new()
        .respond(Response::new(200, json!(1)))
        .fail(RequestError::transport("second call failed"));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(vec![
            TransportConfig::get("https://api.example.com/a"),
            TransportConfig::get("https://api.example.com/b"),
        ])
        .on_rejected(Descriptor::new("BATCH_FAILED"))
        .build();

    let settled = in_flight(&dispatcher, directive).await.expect("settles");
    assert_eq!(settled, Settled::Emitted);
    assert_eq!(sink.types(), vec!["BATCH_FAILED"]);
}

#[tokio::test]
async fn poll_with_batch_options_is_a_config_error() {
    let transport = MockTransport::new();
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(vec![
            TransportConfig::get("https://api.example.com/a"),
            TransportConfig::get("https://api.example.com/b"),
        ])
        .poll(PollSpec::until(|_| true))
        .build();

    let result = dispatcher.intercept(Action::request(directive));
    assert!(matches!(result, Err(RequestError::Config(_))));
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn polling_resolves_once_the_condition_holds() {
    let transport = MockTransport::new()
        .respond(Response::new(102, Value::Null))
        .respond(Response::new(102, Value::Null))
        .respond(Response::new(200, json!({"done": true})));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport.clone(), sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs/7"))
        .poll(
            PollSpec::until(|response| response.status == 200)
                .with_interval(Duration::from_millis(10)),
        )
        .on_fulfilled(Descriptor::new("JOB_DONE"))
        .build();

    let settled = in_flight(&dispatcher, directive).await.expect("settles");
    assert_eq!(settled, Settled::Emitted);
    assert_eq!(transport.calls(), 3);
    assert_eq!(sink.types(), vec!["JOB_DONE"]);
}

#[tokio::test(start_paused = true)]
async fn poll_timeout_routes_through_the_sentinel_status() {
    let transport = MockTransport::new().always(Response::new(102, Value::Null));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport, sink.clone());

    let directive = RequestDirective::builder()
        .options(TransportConfig::get("https://api.example.com/jobs/7"))
        .poll(
            PollSpec::until(|response| response.status == 200)
                .with_interval(Duration::from_millis(10))
                .with_timeout(Duration::from_millis(50)),
        )
        .on_rejected(Descriptor::new("JOB_FAILED"))
        .status_routes(StatusRoutes::new().on(vec![418], Descriptor::new("JOB_TIMED_OUT")))
        .build();

    let settled = in_flight(&dispatcher, directive).await.expect("settles");
    assert_eq!(settled, Settled::Emitted);
    assert_eq!(sink.types(), vec!["JOB_TIMED_OUT"]);
    assert_eq!(dispatcher.active_requests(), 0);
}

#[tokio::test]
async fn computed_options_and_payloads_see_application_state() {
    let transport = MockTransport::new().respond(Response::new(200, Value::Null));
    let sink = CollectingSink::new();
    let dispatcher = dispatcher(transport.clone(), sink.clone());

    let directive: RequestDirective<Value> = RequestDirective::builder()
        .options_from_state(|state: &Value| {
            let user = state
                .get("user")
                .and_then(Value::as_str)
                .unwrap_or("anonymous");
            TransportConfig::get(format!("https://api.example.com/users/{user}")).into()
        })
        .on_fulfilled(
            Descriptor::new("USER_LOADED")
                .with_computed(|_outcome, _directive, state| json!({"state": state})),
        )
        .build();

    let _ = in_flight(&dispatcher, directive).await.expect("settles");

    let issued = transport.requests();
    assert_eq!(issued[0].url, "https://api.example.com/users/u-1");
    assert_eq!(
        sink.events()[0].payload,
        Some(json!({"state": {"user": "u-1"}}))
    );
}
