//! Network subsystem: UDP transport, client session, relay server

pub mod relay;
pub mod session;
pub mod udp;

pub use relay::RelayServer;
pub use session::{Session, SessionState};
pub use udp::bind_udp;
