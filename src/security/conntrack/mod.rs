mod key;
mod table;

pub use key::ConnectionKey;
pub use table::{
    ConnectionEntry, ConnectionStats, ConnectionTable, Timeouts, DEFAULT_CAPACITY, TCP_TTL, UDP_TTL,
};
