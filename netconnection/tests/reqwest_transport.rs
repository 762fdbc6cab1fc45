use netconnection::{
    Config, Context, HttpRequest, JsonObject, MainLooper, Messages, NetworkConnection,
    NetworkDelegate, NetworkError, NetworkState, ReqwestTransport, ThreadLooper, Transport,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_string, body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Success(i32, JsonObject),
    Failure(i32, NetworkError),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(Event, ThreadId)>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    fn threads(&self) -> Vec<ThreadId> {
        self.events.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

impl NetworkDelegate for Recorder {
    fn on_success(&self, request_code: i32, json: JsonObject) {
        self.events
            .lock()
            .unwrap()
            .push((Event::Success(request_code, json), thread::current().id()));
    }

    fn on_failure(&self, request_code: i32, error: NetworkError) {
        self.events
            .lock()
            .unwrap()
            .push((Event::Failure(request_code, error), thread::current().id()));
    }
}

struct Setup {
    conn: NetworkConnection<ReqwestTransport>,
    server: MockServer,
    looper: MainLooper,
    recorder: Arc<Recorder>,
    runtime: Runtime,
}

impl Setup {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        let looper = MainLooper::new();
        let recorder = Arc::new(Recorder::default());
        let context = Context::new(runtime.handle().clone(), Arc::new(looper.handle()));
        let conn = NetworkConnection::with_config(
            Some(recorder.clone() as Arc<dyn NetworkDelegate>),
            context,
            &config,
        )
        .unwrap();
        Self {
            conn,
            server,
            looper,
            recorder,
            runtime,
        }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    fn url(&self, p: &str) -> String {
        format!("{}{}", self.server.uri(), p)
    }

    fn wait_for(&self, count: usize) {
        while self.recorder.events().len() < count {
            assert!(self.looper.run_next(WAIT), "timed out waiting for callbacks");
        }
    }
}

fn object(value: serde_json::Value) -> JsonObject {
    value.as_object().unwrap().clone()
}

#[test]
fn test_post_form_success() {
    let setup = Setup::new();
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .and(body_string_contains("name=\"user\""))
            .and(body_string_contains("taleb"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token":"t-1"}"#)),
    );

    let mut params = HashMap::new();
    params.insert("user".to_string(), "taleb".to_string());
    setup.conn.post_form(&params, &setup.url("/login"), 11);

    assert!(setup.recorder.events().is_empty());
    setup.wait_for(1);

    assert_eq!(
        setup.recorder.events(),
        vec![Event::Success(11, object(json!({"token": "t-1"})))]
    );
    assert_eq!(setup.recorder.threads(), vec![thread::current().id()]);
}

#[test]
fn test_post_form_from_object_stringifies_values() {
    let setup = Setup::new();
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(body_string_contains("name=\"count\""))
            .and(body_string_contains("12"))
            .and(body_string_contains("name=\"label\""))
            .and(body_string_contains("widget"))
            .respond_with(ResponseTemplate::new(201)),
    );

    let params = object(json!({"count": 12, "label": "widget"}));
    setup.conn.post_form_from_object(&params, &setup.url("/items"), 12);
    setup.wait_for(1);

    assert_eq!(
        setup.recorder.events(),
        vec![Event::Success(12, JsonObject::new())]
    );
}

#[test]
fn test_post_json_sends_body_and_headers() {
    let setup = Setup::new();
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/api"))
            .and(header("content-type", "application/json"))
            .and(header("x-api-key", "k1"))
            .and(body_string(r#"{"a":1}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"echo":true}"#)),
    );

    let mut headers = HashMap::new();
    headers.insert("X-Api-Key".to_string(), "k1".to_string());
    setup
        .conn
        .post_json(&setup.url("/api"), 13, r#"{"a":1}"#, Some(&headers));
    setup.wait_for(1);

    assert_eq!(
        setup.recorder.events(),
        vec![Event::Success(13, object(json!({"echo": true})))]
    );
}

#[test]
fn test_status_mapping() {
    let setup = Setup::new();
    for (route, status) in [("/401", 401), ("/403", 403), ("/404", 404), ("/500", 500)] {
        setup.mount(
            Mock::given(method("POST"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(status).set_body_string("ignored")),
        );
    }

    setup.conn.post_json(&setup.url("/401"), 1, "{}", None);
    setup.wait_for(1);
    setup.conn.post_json(&setup.url("/403"), 2, "{}", None);
    setup.wait_for(2);
    setup.conn.post_json(&setup.url("/404"), 3, "{}", None);
    setup.wait_for(3);
    setup.conn.post_json(&setup.url("/500"), 4, "{}", None);
    setup.wait_for(4);

    assert_eq!(
        setup.recorder.events(),
        vec![
            Event::Failure(1, NetworkError::new(401, "Unauthorized")),
            Event::Failure(2, NetworkError::new(403, "Forbidden")),
            Event::Failure(3, NetworkError::new(404, Messages::default().server_connection_error)),
            Event::Failure(4, NetworkError::new(500, "Internal Server Error")),
        ]
    );
}

#[test]
fn test_unhandled_status_silent_when_configured() {
    let setup = Setup::with_config(Config {
        report_unhandled_status: false,
        ..Config::default()
    });
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(502)),
    );
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200)),
    );

    setup.conn.post_json(&setup.url("/broken"), 1, "{}", None);
    // only the marker request produces a callback
    setup.conn.post_json(&setup.url("/ok"), 2, "{}", None);
    setup.wait_for(1);
    while setup.looper.run_next(Duration::from_millis(200)) {}

    assert_eq!(
        setup.recorder.events(),
        vec![Event::Success(2, JsonObject::new())]
    );
}

#[test]
fn test_malformed_json_body() {
    let setup = Setup::new();
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>")),
    );

    setup.conn.post_json(&setup.url("/html"), 21, "{}", None);
    setup.wait_for(1);

    assert_eq!(
        setup.recorder.events(),
        vec![Event::Failure(
            21,
            NetworkError::new(
                NetworkError::UNDEFINED_EXCEPTION,
                Messages::default().exception_in_gathering_info
            )
        )]
    );
}

#[test]
fn test_connection_refused() {
    let setup = Setup::new();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    setup
        .conn
        .post_json(&format!("http://{}/gone", addr), 31, "{}", None);
    setup.wait_for(1);

    assert_eq!(
        setup.recorder.events(),
        vec![Event::Failure(
            31,
            NetworkError::new(
                NetworkError::API_CALL_FAIL,
                Messages::default().server_connection_error
            )
        )]
    );
    assert_eq!(setup.recorder.threads(), vec![thread::current().id()]);
}

#[test]
fn test_offline_is_reported_before_return() {
    let runtime = Runtime::new().unwrap();
    let looper = MainLooper::new();
    let recorder = Arc::new(Recorder::default());
    let network = Arc::new(NetworkState::new(false));
    let context = Context::new(runtime.handle().clone(), Arc::new(looper.handle()))
        .with_connectivity(network.clone());
    let conn = NetworkConnection::new(Some(recorder.clone() as Arc<dyn NetworkDelegate>), context)
        .unwrap();

    conn.post_json("http://127.0.0.1:9/never", 41, "{}", None);

    assert_eq!(
        recorder.events(),
        vec![Event::Failure(
            41,
            NetworkError::new(
                NetworkError::NETWORK_NOT_REACHABLE,
                Messages::default().verify_network_connectivity
            )
        )]
    );
    assert_eq!(looper.run_pending(), 0);
}

#[test]
fn test_concurrent_requests_keep_their_codes() {
    let setup = Setup::new();
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"route":"slow"}"#)
                    .set_delay(Duration::from_millis(300)),
            ),
    );
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"route":"fast"}"#)),
    );

    setup.conn.post_json(&setup.url("/slow"), 100, "{}", None);
    setup.conn.post_json(&setup.url("/fast"), 200, "{}", None);
    setup.wait_for(2);

    let mut events = setup.recorder.events();
    events.sort_by_key(|e| match e {
        Event::Success(code, _) | Event::Failure(code, _) => *code,
    });
    assert_eq!(
        events,
        vec![
            Event::Success(100, object(json!({"route": "slow"}))),
            Event::Success(200, object(json!({"route": "fast"}))),
        ]
    );
    let me = thread::current().id();
    assert!(setup.recorder.threads().iter().all(|t| *t == me));
}

struct ChannelDelegate(Mutex<mpsc::Sender<(i32, ThreadId)>>);

impl NetworkDelegate for ChannelDelegate {
    fn on_success(&self, request_code: i32, _json: JsonObject) {
        let _ = self.0.lock().unwrap().send((request_code, thread::current().id()));
    }

    fn on_failure(&self, request_code: i32, _error: NetworkError) {
        let _ = self.0.lock().unwrap().send((-request_code, thread::current().id()));
    }
}

#[test]
fn test_thread_looper_delivery() {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server),
    );

    let looper = Arc::new(ThreadLooper::spawn("netconnection-callbacks").unwrap());
    let callback_thread = looper.handle().thread_id();
    let (tx, rx) = mpsc::channel();
    let context = Context::new(runtime.handle().clone(), looper.clone());
    let delegate: Arc<dyn NetworkDelegate> = Arc::new(ChannelDelegate(Mutex::new(tx)));
    let conn = NetworkConnection::new(Some(delegate), context).unwrap();

    conn.post_json(&format!("{}/any", server.uri()), 7, "{}", None);

    let (code, ran_on) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(code, 7);
    assert_eq!(ran_on, callback_thread);
    assert_ne!(ran_on, thread::current().id());
}

#[test]
fn test_configured_messages_are_delivered() {
    let setup = Setup::with_config(
        Config::from_toml_str(
            r#"
            [messages]
            server_connection_error = "Server down"
            "#,
        )
        .unwrap(),
    );
    setup.mount(
        Mock::given(method("POST"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404)),
    );

    setup.conn.post_json(&setup.url("/missing"), 51, "{}", None);
    setup.wait_for(1);

    assert_eq!(
        setup.recorder.events(),
        vec![Event::Failure(51, NetworkError::new(404, "Server down"))]
    );
}

#[test]
fn test_transport_passes_response_headers_through() {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/trace"))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("x-request-id", "req-9")
                    .set_body_string("queued"),
            )
            .mount(&server),
    );

    let transport = ReqwestTransport::new().unwrap();
    let request = HttpRequest::json(&format!("{}/trace", server.uri()), "{}", None);
    let response = runtime.block_on(transport.execute(request)).unwrap();

    assert_eq!(response.status, 202);
    assert_eq!(response.status_text, "Accepted");
    assert_eq!(response.body, b"queued".to_vec());
    assert!(response
        .headers
        .iter()
        .any(|(k, v)| k == "x-request-id" && v == "req-9"));
}
