// Fanout Infrastructure - Network Adapters
// Implements: Connector over TCP, plus the stub lookup service used in tests and demos

pub mod stub_server;
pub mod tcp;

pub use stub_server::{Catalog, StubServer};
pub use tcp::{TcpConnection, TcpConnector};
