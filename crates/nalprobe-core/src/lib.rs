//! # nalprobe-core
//!
//! nalprobe 核心库, 提供比特流读写与统一错误类型.
//!
//! 上层的 H.264 参数集解析器全部建立在 [`bitreader::BitReader`] 之上:
//! 每个字段解析器都是对 `read_bit` / `read_bits` / `read_ue` 的线性调用序列.

pub mod bitreader;
pub mod bitwriter;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{ProbeError, ProbeResult};
