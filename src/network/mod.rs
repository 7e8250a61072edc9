pub mod capture;
pub mod packet;
pub mod replay;

pub use capture::{LogSink, PacketCapture};
