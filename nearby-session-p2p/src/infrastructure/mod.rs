pub mod error;
pub mod memory;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use memory::{HandshakeMode, MemoryNetwork, MemoryTransport};
pub use transport::{Reliability, Transport};
