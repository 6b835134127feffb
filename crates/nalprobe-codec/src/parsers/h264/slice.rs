//! H.264 切片头解析器.
//!
//! 只解析切片头最前面的三个字段, 足以判断切片类型与引用的 PPS.

use std::fmt;

use nalprobe_core::ProbeResult;
use nalprobe_core::bitreader::BitReader;

/// 切片类型 (slice_type % 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceKind {
    P,
    B,
    I,
    Sp,
    Si,
}

impl fmt::Display for SliceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::P => "P",
            Self::B => "B",
            Self::I => "I",
            Self::Sp => "SP",
            Self::Si => "SI",
        };
        write!(f, "{}", name)
    }
}

/// 切片头的前三个字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceHeader {
    /// 切片中第一个宏块的地址
    pub first_mb_in_slice: u32,
    /// 原始 slice_type (0-9, 5-9 表示整帧同类型)
    pub slice_type: u32,
    /// 引用的 pic_parameter_set_id
    pub pps_id: u32,
}

impl SliceHeader {
    /// 切片类型
    pub fn kind(&self) -> SliceKind {
        match self.slice_type % 5 {
            0 => SliceKind::P,
            1 => SliceKind::B,
            2 => SliceKind::I,
            3 => SliceKind::Sp,
            _ => SliceKind::Si,
        }
    }
}

/// 从 RBSP 数据 (已去除 NAL 头部与防竞争字节) 解析切片头
pub fn parse_slice_header(rbsp: &[u8]) -> ProbeResult<SliceHeader> {
    let mut br = BitReader::new(rbsp);
    let first_mb_in_slice = br.read_ue()?;
    let slice_type = br.read_ue()?;
    let pps_id = br.read_ue()?;
    Ok(SliceHeader {
        first_mb_in_slice,
        slice_type,
        pps_id,
    })
}
