pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod security;
pub mod select_device;
pub mod setup_firewall;
pub mod setup_logger;

pub use crate::config::{AppConfig, RuleFile};
pub use crate::core::{FirewallError, FirewallResult, PacketError, PacketPipeline, PipelineSummary};
pub use crate::network::packet::{decode, Direction, NormalizedPacket, Protocol};
pub use crate::security::conntrack::ConnectionTable;
pub use crate::security::firewall::{
    EngineConfig, Firewall, FirewallAction, FirewallRule, RuleMatch, RuleSet, Verdict,
};
