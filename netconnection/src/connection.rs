// netconnection/src/connection.rs
use crate::config::Config;
use crate::context::{Context, Localizer, MessageKey};
use crate::error::{NetworkError, TransportError};
use crate::http::{form_fields_from_map, form_fields_from_object, HttpRequest, HttpResponse, Transport};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "reqwest")]
use crate::http::ReqwestTransport;

pub type JsonObject = Map<String, Value>;

/// Receives the outcome of every request, always on the callback thread
/// (except the offline pre-flight failure, which is reported inline).
pub trait NetworkDelegate: Send + Sync {
    fn on_success(&self, request_code: i32, json: JsonObject);
    fn on_failure(&self, request_code: i32, error: NetworkError);
}

/// What a received response maps to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(JsonObject),
    Failure(NetworkError),
    /// Unhandled status with reporting turned off
    Ignored,
}

/// Map a received response onto a callback.
///
/// Errors only when a 200/201 body is not a JSON object.
pub fn classify_response(
    response: &HttpResponse,
    strings: &dyn Localizer,
    report_unhandled_status: bool,
) -> Result<Outcome, serde_json::Error> {
    let outcome = match response.status {
        200 | 201 => Outcome::Success(parse_body(&response.body)?),
        401 | 403 => Outcome::Failure(NetworkError::new(
            i32::from(response.status),
            response.status_text.clone(),
        )),
        404 => Outcome::Failure(NetworkError::new(
            404,
            strings.string_for(MessageKey::ServerConnectionError),
        )),
        status if report_unhandled_status => Outcome::Failure(NetworkError::new(
            i32::from(status),
            response.status_text.clone(),
        )),
        _ => Outcome::Ignored,
    };
    Ok(outcome)
}

fn parse_body(body: &[u8]) -> Result<JsonObject, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonObject::new());
    }
    serde_json::from_slice(body)
}

struct Shared<T> {
    transport: T,
    delegate: Option<Arc<dyn NetworkDelegate>>,
    context: Context,
    report_unhandled_status: bool,
}

impl<T> Shared<T> {
    fn succeed(&self, request_code: i32, json: JsonObject) {
        if let Some(delegate) = &self.delegate {
            delegate.on_success(request_code, json);
        }
    }

    fn fail(&self, request_code: i32, error: NetworkError) {
        if let Some(delegate) = &self.delegate {
            delegate.on_failure(request_code, error);
        }
    }

    fn handle_response(&self, response: HttpResponse, request_code: i32) {
        match classify_response(
            &response,
            self.context.strings.as_ref(),
            self.report_unhandled_status,
        ) {
            Ok(Outcome::Success(json)) => {
                debug!("request {} succeeded with HTTP {}", request_code, response.status);
                self.succeed(request_code, json);
            }
            Ok(Outcome::Failure(error)) => {
                debug!("request {} failed with HTTP {}", request_code, response.status);
                self.fail(request_code, error);
            }
            Ok(Outcome::Ignored) => {
                warn!(
                    "request {}: dropping unhandled HTTP {} {}",
                    request_code, response.status, response.status_text
                );
            }
            Err(e) => {
                warn!("request {}: could not process response: {}", request_code, e);
                self.fail(
                    request_code,
                    NetworkError::new(
                        NetworkError::UNDEFINED_EXCEPTION,
                        self.context.string_for(MessageKey::ExceptionInGatheringInfo),
                    ),
                );
            }
        }
    }

    fn complete(&self, request_code: i32, result: Result<HttpResponse, TransportError>) {
        match result {
            Ok(response) => self.handle_response(response, request_code),
            Err(e) if e.is_processing_failure() => {
                warn!("request {}: {}", request_code, e);
                self.fail(
                    request_code,
                    NetworkError::new(
                        NetworkError::UNDEFINED_EXCEPTION,
                        self.context.string_for(MessageKey::ExceptionInGatheringInfo),
                    ),
                );
            }
            Err(e) => {
                warn!("request {}: {}", request_code, e);
                self.fail(
                    request_code,
                    NetworkError::new(
                        NetworkError::API_CALL_FAIL,
                        self.context.string_for(MessageKey::ServerConnectionError),
                    ),
                );
            }
        }
    }
}

/// Fire-and-forget POST helper.
///
/// Owns one transport, shared by every call. Each POST checks connectivity,
/// spawns the request on the context's runtime and returns immediately; the
/// result reaches the delegate through the context's callback executor.
pub struct NetworkConnection<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for NetworkConnection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[cfg(feature = "reqwest")]
impl NetworkConnection<ReqwestTransport> {
    pub fn new(
        delegate: Option<Arc<dyn NetworkDelegate>>,
        context: Context,
    ) -> Result<Self, TransportError> {
        Self::with_config(delegate, context, &Config::default())
    }

    pub fn with_config(
        delegate: Option<Arc<dyn NetworkDelegate>>,
        context: Context,
        config: &Config,
    ) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::with_connect_timeout(config.connect_timeout())?;
        Ok(Self::with_transport(transport, delegate, context, config))
    }
}

impl<T: Transport + 'static> NetworkConnection<T> {
    pub fn with_transport(
        transport: T,
        delegate: Option<Arc<dyn NetworkDelegate>>,
        context: Context,
        config: &Config,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                delegate,
                context: context.with_default_messages(&config.messages),
                report_unhandled_status: config.report_unhandled_status,
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// POST `parameters` as multipart/form-data.
    pub fn post_form(&self, parameters: &HashMap<String, String>, url: &str, request_code: i32) {
        self.submit(request_code, || {
            HttpRequest::multipart(url, form_fields_from_map(parameters))
        });
    }

    /// POST the entries of a JSON object as multipart/form-data.
    pub fn post_form_from_object(&self, parameters: &JsonObject, url: &str, request_code: i32) {
        self.submit(request_code, || {
            HttpRequest::multipart(url, form_fields_from_object(parameters))
        });
    }

    /// POST `body` verbatim as `application/json`, plus any extra headers.
    pub fn post_json(
        &self,
        url: &str,
        request_code: i32,
        body: &str,
        headers: Option<&HashMap<String, String>>,
    ) {
        self.submit(request_code, || HttpRequest::json(url, body, headers));
    }

    /// Deliver a received response to the delegate. Runs on the calling
    /// thread; the POST methods call it from the callback executor.
    pub fn handle_response(&self, response: HttpResponse, request_code: i32) {
        self.shared.handle_response(response, request_code);
    }

    fn submit<F>(&self, request_code: i32, build: F)
    where
        F: FnOnce() -> HttpRequest,
    {
        let context = &self.shared.context;
        if !context.is_network_connected() {
            debug!("request {}: network not reachable", request_code);
            self.shared.fail(
                request_code,
                NetworkError::new(
                    NetworkError::NETWORK_NOT_REACHABLE,
                    context.string_for(MessageKey::VerifyNetworkConnectivity),
                ),
            );
            return;
        }

        let request = build();
        debug!("request {}: POST {}", request_code, request.url);

        let guard = InFlight {
            shared: Some(Arc::clone(&self.shared)),
            request_code,
        };
        let io = Arc::clone(&self.shared);
        context.runtime.spawn(async move {
            let task = tokio::spawn(async move { io.transport.execute(request).await });
            let result = match task.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(TransportError::Panicked(e.to_string())),
                Err(e) => Err(TransportError::Abandoned(e.to_string())),
            };
            guard.finish(result);
        });
    }
}

/// Posts exactly one completion for a spawned request. If the task is
/// dropped before finishing, e.g. on runtime shutdown, the drop reports it.
struct InFlight<T: Transport + 'static> {
    shared: Option<Arc<Shared<T>>>,
    request_code: i32,
}

impl<T: Transport + 'static> InFlight<T> {
    fn finish(mut self, result: Result<HttpResponse, TransportError>) {
        if let Some(shared) = self.shared.take() {
            deliver(shared, self.request_code, result);
        }
    }
}

impl<T: Transport + 'static> Drop for InFlight<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let error = TransportError::Abandoned("request task was dropped".to_string());
            deliver(shared, self.request_code, Err(error));
        }
    }
}

fn deliver<T: Transport + 'static>(
    shared: Arc<Shared<T>>,
    request_code: i32,
    result: Result<HttpResponse, TransportError>,
) {
    let main_thread = Arc::clone(&shared.context.main_thread);
    main_thread.post(Box::new(move || shared.complete(request_code, result)));
}
