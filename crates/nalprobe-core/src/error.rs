//! 统一错误类型定义.
//!
//! 所有 nalprobe crate 共用的错误类型. 解析过程遇到第一个不支持或越界的条件即返回,
//! 不产生部分结果.

use thiserror::Error;

/// nalprobe 统一错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// NAL 缓冲区大小不在 [4, 1500) 范围内
    #[error("NAL 单元大小非法: size={0}, 允许范围 [4, 1500)")]
    InvalidSize(usize),

    /// SPS 的 profile_idc 不在支持列表中
    #[error("不支持的 profile_idc: {0}")]
    UnsupportedProfile(u8),

    /// 码流使用了未实现的特性 (如 SPS scaling list)
    #[error("不支持的特性: {0}")]
    UnsupportedFeature(String),

    /// 读取位或字节时超出缓冲区边界
    #[error("输入数据截断, 读取超出缓冲区边界")]
    TruncatedInput,

    /// 聚合包 (STAP-A) 中子单元声明的长度超过剩余字节数
    #[error("聚合包格式错误: declared={declared}, remaining={remaining}")]
    MalformedAggregate {
        /// 子单元声明长度
        declared: usize,
        /// 缓冲区剩余字节数
        remaining: usize,
    },

    /// 无效参数 (调用方错误)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),
}

/// nalprobe 统一 Result 类型
pub type ProbeResult<T> = Result<T, ProbeError>;
