//! H.264 NAL (Network Abstraction Layer) 单元解析.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────┘
//! ```
//!
//! # Annex B 格式
//!
//! 使用起始码 `00 00 01` 或 `00 00 00 01` 分隔 NAL 单元.
//!
//! # STAP-A 聚合包 (RFC 6184, type=24)
//! ```text
//! [STAP-A 头: 1 byte] { [size: 2 bytes BE] [NAL: size bytes] } ...
//! ```
//!
//! 所有 `NalUnit` 均借用自调用方的缓冲区, 不复制数据.

use byteorder::{BigEndian, ByteOrder};
use nalprobe_core::{ProbeError, ProbeResult};

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// SPS 扩展
    SpsExtension,
    /// 单时间聚合包 A (RTP)
    StapA,
    /// 单时间聚合包 B (RTP)
    StapB,
    /// 多时间聚合包, 16 位偏移 (RTP)
    Mtap16,
    /// 多时间聚合包, 24 位偏移 (RTP)
    Mtap24,
    /// 分片单元 A (RTP)
    FuA,
    /// 分片单元 B (RTP)
    FuB,
    /// 未知类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            24 => Self::StapA,
            25 => Self::StapB,
            26 => Self::Mtap16,
            27 => Self::Mtap24,
            28 => Self::FuA,
            29 => Self::FuB,
            _ => Self::Unknown(type_id),
        }
    }

    /// 从 NAL 头部字节取低 5 位创建
    pub fn from_header(header: u8) -> Self {
        Self::from_type_id(header & 0x1F)
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::StapA => 24,
            Self::StapB => 25,
            Self::Mtap16 => 26,
            Self::Mtap24 => 27,
            Self::FuA => 28,
            Self::FuB => 29,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为关键帧 (IDR)
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }

    /// 是否为 RTP 载荷结构 (聚合包或分片单元), 而非真正的 NAL 单元
    pub fn is_rtp_payload_structure(&self) -> bool {
        matches!(
            self,
            Self::StapA | Self::StapB | Self::Mtap16 | Self::Mtap24 | Self::FuA | Self::FuB
        )
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::SpsExtension => write!(f, "SPSExt"),
            Self::StapA => write!(f, "STAP-A"),
            Self::StapB => write!(f, "STAP-B"),
            Self::Mtap16 => write!(f, "MTAP16"),
            Self::Mtap24 => write!(f, "MTAP24"),
            Self::FuA => write!(f, "FU-A"),
            Self::FuB => write!(f, "FU-B"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 借用自父缓冲区的 NAL 单元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// nal_ref_idc (参考重要性, 0-3)
    pub ref_idc: u8,
    /// NAL 单元原始数据 (不含起始码, 含 NAL 头部字节)
    pub data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// 从 NAL 数据 (含头部字节) 构造
    ///
    /// 只解释头部字节, 不校验 forbidden_zero_bit.
    pub fn parse(data: &'a [u8]) -> ProbeResult<Self> {
        let Some(&header) = data.first() else {
            return Err(ProbeError::TruncatedInput);
        };

        Ok(Self {
            nal_type: NalUnitType::from_header(header),
            ref_idc: (header >> 5) & 0x03,
            data,
        })
    }

    /// forbidden_zero_bit 是否被置位 (码流损坏的标志)
    pub fn forbidden_bit_set(&self) -> bool {
        self.data[0] & 0x80 != 0
    }

    /// NAL 头部之后的载荷 (仍含 emulation prevention 字节)
    pub fn payload(&self) -> &'a [u8] {
        &self.data[1..]
    }

    /// 获取 RBSP (Raw Byte Sequence Payload) 数据
    ///
    /// 移除 NAL 头部字节和 emulation prevention 字节 (0x03).
    pub fn rbsp(&self) -> Vec<u8> {
        unescape_rbsp(self.payload())
    }
}

/// 移除 emulation prevention 字节 (`00 00 03` → `00 00`)
///
/// 从左到右扫描, 只在连续三个字节恰好为 `00 00 03` 时丢弃 0x03,
/// 窗口之间不重叠; 其余字节原样复制. 输出长度不超过输入长度.
pub fn unescape_rbsp(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let is_emulation_prevention =
            i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03;
        if is_emulation_prevention {
            rbsp.push(0x00);
            rbsp.push(0x00);
            i += 3; // 跳过 0x03
        } else {
            rbsp.push(data[i]);
            i += 1;
        }
    }

    rbsp
}

/// 从 Annex B 字节流中分割出所有 NAL 单元
///
/// 支持 3 字节 (00 00 01) 和 4 字节 (00 00 00 01) 起始码.
/// 返回的 NAL 单元不含起始码, 借用自 `data`.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit<'_>> {
    let offsets = find_start_codes(data);
    let mut nalus = Vec::new();

    for (i, &start) in offsets.iter().enumerate() {
        let end = if i + 1 < offsets.len() {
            // 下一个起始码之前
            offsets[i + 1]
        } else {
            data.len()
        };

        // 跳过起始码
        let nal_start = skip_start_code(data, start);
        if nal_start >= end {
            continue;
        }

        // 去除尾部的 0 字节 (trailing zeros)
        let mut nal_end = end;
        while nal_end > nal_start && data[nal_end - 1] == 0x00 {
            nal_end -= 1;
        }

        if nal_end > nal_start {
            if let Ok(nalu) = NalUnit::parse(&data[nal_start..nal_end]) {
                nalus.push(nalu);
            }
        }
    }

    nalus
}

/// STAP-A 子单元长度前缀大小 (字节)
const STAP_A_LENGTH_SIZE: usize = 2;

/// 拆分 STAP-A 聚合包 (含 1 字节聚合头)
///
/// 每个子单元的声明长度都先与剩余字节数比较再取切片. 长度前缀本身被截断时返回
/// [`ProbeError::TruncatedInput`], 声明长度超过剩余字节时返回
/// [`ProbeError::MalformedAggregate`]. 长度为 0 的子单元被跳过.
pub fn split_stap_a(data: &[u8]) -> ProbeResult<Vec<NalUnit<'_>>> {
    if data.is_empty() {
        return Err(ProbeError::TruncatedInput);
    }

    let mut nalus = Vec::new();
    let mut pos = 1;

    while pos < data.len() {
        if data.len() - pos < STAP_A_LENGTH_SIZE {
            return Err(ProbeError::TruncatedInput);
        }
        let declared = BigEndian::read_u16(&data[pos..pos + STAP_A_LENGTH_SIZE]) as usize;
        pos += STAP_A_LENGTH_SIZE;

        let remaining = data.len() - pos;
        if declared > remaining {
            return Err(ProbeError::MalformedAggregate {
                declared,
                remaining,
            });
        }
        if declared > 0 {
            nalus.push(NalUnit::parse(&data[pos..pos + declared])?);
        }
        pos += declared;
    }

    Ok(nalus)
}

// ============================================================
// 内部工具函数
// ============================================================

/// 查找所有起始码的位置
fn find_start_codes(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                // 3 字节起始码
                positions.push(i);
                i += 3;
                continue;
            } else if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                // 4 字节起始码
                positions.push(i);
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    positions
}

/// 跳过起始码, 返回 NAL 数据的起始位置
fn skip_start_code(data: &[u8], pos: usize) -> usize {
    if data[pos..].starts_with(&[0x00, 0x00, 0x00, 0x01]) {
        pos + 4
    } else if data[pos..].starts_with(&[0x00, 0x00, 0x01]) {
        pos + 3
    } else {
        pos
    }
}
