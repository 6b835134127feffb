//! H.264 PPS (Picture Parameter Set) 解析器.
//!
//! 只读取 PPS 开头的两个 ID, 用于把切片关联到对应的 SPS.

use nalprobe_core::ProbeResult;
use nalprobe_core::bitreader::BitReader;

/// PPS 解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pps {
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// seq_parameter_set_id
    pub sps_id: u32,
}

/// 从 RBSP 数据 (已去除 NAL 头部与防竞争字节) 解析 PPS
pub fn parse_pps(rbsp: &[u8]) -> ProbeResult<Pps> {
    let mut br = BitReader::new(rbsp);
    let pps_id = br.read_ue()?;
    let sps_id = br.read_ue()?;
    Ok(Pps { pps_id, sps_id })
}
