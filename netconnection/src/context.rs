// netconnection/src/context.rs
use crate::looper::CallbackExecutor;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Reports whether the active network interface is connected.
pub trait Connectivity: Send + Sync {
    fn is_network_connected(&self) -> bool;
}

impl<F> Connectivity for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_network_connected(&self) -> bool {
        self()
    }
}

/// Connectivity flag flipped by the host when the platform reports a change.
#[derive(Debug)]
pub struct NetworkState {
    connected: AtomicBool,
}

impl NetworkState {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for NetworkState {
    fn is_network_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// User-facing messages the connection can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    VerifyNetworkConnectivity,
    ServerConnectionError,
    ExceptionInGatheringInfo,
}

pub trait Localizer: Send + Sync {
    fn string_for(&self, key: MessageKey) -> String;
}

/// Message table, also the `[messages]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Messages {
    #[serde(default = "default_verify_network_connectivity")]
    pub verify_network_connectivity: String,
    #[serde(default = "default_server_connection_error")]
    pub server_connection_error: String,
    #[serde(default = "default_exception_in_gathering_info")]
    pub exception_in_gathering_info: String,
}

fn default_verify_network_connectivity() -> String {
    "Please verify your network connectivity".to_string()
}

fn default_server_connection_error() -> String {
    "Could not connect to the server".to_string()
}

fn default_exception_in_gathering_info() -> String {
    "Something went wrong while gathering information".to_string()
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            verify_network_connectivity: default_verify_network_connectivity(),
            server_connection_error: default_server_connection_error(),
            exception_in_gathering_info: default_exception_in_gathering_info(),
        }
    }
}

impl Localizer for Messages {
    fn string_for(&self, key: MessageKey) -> String {
        match key {
            MessageKey::VerifyNetworkConnectivity => self.verify_network_connectivity.clone(),
            MessageKey::ServerConnectionError => self.server_connection_error.clone(),
            MessageKey::ExceptionInGatheringInfo => self.exception_in_gathering_info.clone(),
        }
    }
}

/// Everything a [`NetworkConnection`](crate::NetworkConnection) needs from its host.
#[derive(Clone)]
pub struct Context {
    pub(crate) runtime: Handle,
    pub(crate) connectivity: Arc<dyn Connectivity>,
    pub(crate) main_thread: Arc<dyn CallbackExecutor>,
    pub(crate) strings: Arc<dyn Localizer>,
    custom_strings: bool,
}

impl Context {
    /// I/O is spawned on `runtime`; callbacks are posted to `main_thread`.
    /// Starts out connected. Messages come from the connection's [`Config`]
    /// unless [`Context::with_strings`] installs a localizer.
    ///
    /// [`Config`]: crate::Config
    pub fn new(runtime: Handle, main_thread: Arc<dyn CallbackExecutor>) -> Self {
        Self {
            runtime,
            connectivity: Arc::new(NetworkState::default()),
            main_thread,
            strings: Arc::new(Messages::default()),
            custom_strings: false,
        }
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_strings(mut self, strings: Arc<dyn Localizer>) -> Self {
        self.strings = strings;
        self.custom_strings = true;
        self
    }

    /// Install `messages` unless a localizer was set explicitly.
    pub(crate) fn with_default_messages(mut self, messages: &Messages) -> Self {
        if !self.custom_strings {
            self.strings = Arc::new(messages.clone());
        }
        self
    }

    pub fn is_network_connected(&self) -> bool {
        self.connectivity.is_network_connected()
    }

    pub fn string_for(&self, key: MessageKey) -> String {
        self.strings.string_for(key)
    }
}
