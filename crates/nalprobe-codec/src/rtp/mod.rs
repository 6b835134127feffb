//! RTP 包解析与序列号工具.

pub mod header;
pub mod seq;

pub use header::{RTP_HEADER_SIZE, RtpExtension, RtpHeader, RtpPacket};
