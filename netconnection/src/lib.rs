// netconnection/src/lib.rs
//! Fire-and-forget POST requests with results delivered on a designated
//! callback thread.
//!
//! ```ignore
//! let looper = MainLooper::new();
//! let context = Context::new(runtime.handle().clone(), Arc::new(looper.handle()));
//! let conn = NetworkConnection::new(Some(delegate), context)?;
//! conn.post_json("https://example.com/api", 1, r#"{"q":1}"#, None);
//! looper.run_next(Duration::from_secs(20));
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod http;
pub mod looper;

pub use config::Config;
pub use connection::{classify_response, JsonObject, NetworkConnection, NetworkDelegate, Outcome};
pub use context::{Connectivity, Context, Localizer, MessageKey, Messages, NetworkState};
pub use error::{NetworkError, TransportError};
pub use http::{FormField, HttpRequest, HttpResponse, RequestBody, Transport};
pub use looper::{Callback, CallbackExecutor, LooperHandle, MainLooper, ThreadLooper};

// Re-export reqwest transport when feature is enabled
#[cfg(feature = "reqwest")]
pub use http::ReqwestTransport;
