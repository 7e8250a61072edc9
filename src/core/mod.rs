pub mod decision;
pub mod error;
pub mod memory;
pub mod pipeline;

pub use decision::DecisionRecord;
pub use error::{ConfigError, FirewallError, FirewallResult, PacketError};
pub use memory::{MemorySink, MemorySource};
pub use pipeline::{PacketPipeline, PacketSource, PipelineSummary, RawPacket, VerdictSink};
