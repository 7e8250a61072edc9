pub mod conntrack;
pub mod firewall;

pub use conntrack::ConnectionTable;
pub use firewall::{Firewall, Verdict};
