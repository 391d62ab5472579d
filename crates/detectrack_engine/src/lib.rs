//! Detectrack engine: HTTP transport and the async controller runtime.
mod controller;
mod observer;
mod poll;
mod settings;
mod transport;
mod wire;

pub use controller::Controller;
pub use observer::StateObserver;
pub use settings::{ClientSettings, ControllerSettings, SettingsError, TransportSettings};
pub use transport::{download_url, HttpTransport, JobTransport};
