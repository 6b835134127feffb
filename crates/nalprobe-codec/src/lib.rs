//! # nalprobe-codec
//!
//! H.264 码流元数据探测库.
//!
//! 从 RTP 视频载荷中的 NAL 单元提取图像尺寸, 参数集 ID 与切片引用,
//! 不解码任何像素数据. 所有解析函数都只借用输入缓冲区, 不保留跨调用的状态.
//!
//! ## 使用示例
//!
//! ```rust
//! use nalprobe_codec::parsers::h264::parse_rtp_video;
//!
//! // 访问单元分隔符 (AUD), 只返回 NAL 类型
//! let info = parse_rtp_video(&[0x09, 0xF0, 0x00, 0x00]).unwrap();
//! assert_eq!(info.nal_type, 9);
//! assert!(info.dimensions.is_none());
//! ```

pub mod parsers;
pub mod rtp;

// 重导出常用类型
pub use parsers::h264::{Dimensions, RtpVideoInfo, parse_rtp_video};
pub use rtp::{RtpHeader, RtpPacket};
