//! RTP 视频载荷的 NAL 分发器.
//!
//! 输入为一个 RTP 载荷 (单个 NAL 单元或 STAP-A 聚合包), 按 NAL 类型选择字段解析器,
//! 输出该载荷携带的编码参数: 图像尺寸, 参数集 ID 以及切片引用的 PPS.
//!
//! 每次调用都是无状态的纯函数, 不缓存任何参数集.

use log::{debug, trace};
use nalprobe_core::{ProbeError, ProbeResult};

use super::nal::{NalUnit, NalUnitType, split_stap_a, unescape_rbsp};
use super::pps::{Pps, parse_pps};
use super::slice::{SliceHeader, parse_slice_header};
use super::sps::{Sps, parse_sps};

/// 可解析的最小 NAL 长度 (字节, 含)
pub const MIN_NAL_SIZE: usize = 4;
/// 可解析的最大 NAL 长度 (字节, 不含)
pub const MAX_NAL_SIZE: usize = 1500;

/// 图像尺寸 (像素, 已应用 cropping)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
}

impl From<&Sps> for Dimensions {
    fn from(sps: &Sps) -> Self {
        Self {
            width: sps.width,
            height: sps.height,
        }
    }
}

/// 单个 RTP 视频载荷的解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpVideoInfo {
    /// 外层 NAL 类型 (首字节低 5 位)
    pub nal_type: u8,
    /// 图像尺寸, 仅当载荷携带可解析的 SPS 时存在
    pub dimensions: Option<Dimensions>,
    /// SPS ID, 与 `dimensions` 同时存在
    pub sps_id: Option<u32>,
    /// PPS ID 及其引用的 SPS ID
    pub pps: Option<Pps>,
    /// 切片头前三个字段
    pub slice: Option<SliceHeader>,
}

impl RtpVideoInfo {
    fn apply_sps(&mut self, sps: &Sps) {
        self.dimensions = Some(Dimensions::from(sps));
        self.sps_id = Some(sps.sps_id);
    }
}

/// 解析一个 RTP 视频载荷 (含 NAL 头部字节)
///
/// - 长度不在 `[MIN_NAL_SIZE, MAX_NAL_SIZE)` 内时返回 [`ProbeError::InvalidSize`]
/// - SPS: 解析错误直接返回
/// - STAP-A: 拆包错误直接返回; 由最后一个 SPS 子单元决定结果, 其解析失败时没有尺寸
/// - PPS 与切片: 尽力解析, 失败时对应字段为 `None`
/// - 其他类型: 只返回 `nal_type`
pub fn parse_rtp_video(nal_data: &[u8]) -> ProbeResult<RtpVideoInfo> {
    if nal_data.len() < MIN_NAL_SIZE || nal_data.len() >= MAX_NAL_SIZE {
        return Err(ProbeError::InvalidSize(nal_data.len()));
    }

    let nal = NalUnit::parse(nal_data)?;
    let mut info = RtpVideoInfo {
        nal_type: nal.nal_type.type_id(),
        ..RtpVideoInfo::default()
    };

    match nal.nal_type {
        NalUnitType::Sps => {
            let sps = parse_sps(&nal.rbsp())?;
            info.apply_sps(&sps);
        }
        NalUnitType::StapA => {
            for sub in split_stap_a(nal_data)? {
                probe_aggregated_unit(&sub, &mut info);
            }
        }
        NalUnitType::Pps => info.pps = try_parse_pps(&nal),
        NalUnitType::Slice | NalUnitType::SliceIdr => info.slice = try_parse_slice(&nal),
        other => trace!("H.264: 忽略 NAL 类型 {}", other),
    }

    Ok(info)
}

/// 处理 STAP-A 中的一个子单元
///
/// 每个 SPS 子单元都覆盖之前的结果: 解析失败时清空尺寸与 sps_id.
fn probe_aggregated_unit(sub: &NalUnit<'_>, info: &mut RtpVideoInfo) {
    match sub.nal_type {
        NalUnitType::Sps => match parse_sps(&sub.rbsp()) {
            Ok(sps) => info.apply_sps(&sps),
            Err(e) => {
                debug!("H.264: STAP-A 中的 SPS 解析失败: {}", e);
                info.dimensions = None;
                info.sps_id = None;
            }
        },
        NalUnitType::Pps => {
            if let Some(pps) = try_parse_pps(sub) {
                info.pps = Some(pps);
            }
        }
        other => trace!("H.264: STAP-A 子单元类型 {}, len={}", other, sub.data.len()),
    }
}

fn try_parse_pps(nal: &NalUnit<'_>) -> Option<Pps> {
    parse_pps(&unescape_rbsp(nal.payload()))
        .map_err(|e| debug!("H.264: PPS 解析失败: {}", e))
        .ok()
}

fn try_parse_slice(nal: &NalUnit<'_>) -> Option<SliceHeader> {
    parse_slice_header(&unescape_rbsp(nal.payload()))
        .map_err(|e| debug!("H.264: {} 切片头解析失败: {}", nal.nal_type, e))
        .ok()
}
