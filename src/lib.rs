//! # nalprobe
//!
//! 纯 Rust 实现的 H.264 码流元数据探测工具.
//!
//! 从 RTP 视频载荷携带的 NAL 单元中提取:
//! - **图像尺寸**: 由 SPS 计算, 已应用 cropping
//! - **参数集 ID**: SPS ID, PPS ID 及其引用关系
//! - **切片引用**: 切片类型与引用的 PPS
//!
//! 不解码像素数据, 也不保留任何跨 NAL 单元的解码状态.
//!
//! # 快速开始
//!
//! ```rust
//! use nalprobe::codec::parsers::h264::split_annex_b;
//!
//! let stream = [0x00, 0x00, 0x00, 0x01, 0x09, 0xF0, 0x00, 0x00, 0x01, 0x65, 0x88];
//! let nalus = split_annex_b(&stream);
//! assert_eq!(nalus.len(), 2);
//! println!("第一个 NAL: {}", nalus[0].nal_type);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `nalprobe-core` | 比特流读写与错误类型 |
//! | `nalprobe-codec` | H.264 参数集解析与 RTP 工具 |

/// 比特流读写与错误类型
pub use nalprobe_core as core;

/// H.264 参数集解析与 RTP 工具
pub use nalprobe_codec as codec;

/// 获取 nalprobe 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
