//! LAN session discovery and transport: UDP broadcast announce/listen (C4)
//! plus TCP host/guest roles (C5), built on `tokio`. Knows nothing about
//! editing intents — see the `editor` crate for the facade that drives this
//! from user actions.

pub mod config;
pub mod discovery;
pub mod error;
pub mod transport;

pub use config::{read_deadline, DiscoveryConfig, PortRange};
pub use discovery::{
    announce_loop, bind_listener, listen_loop, run_listener, SessionDescriptor, SessionDirectory,
};
pub use error::{DiscoveryError, TransportError};
pub use transport::{connect, ClientMap, Guest, Host, SharedDocument, SharedRegistry};
