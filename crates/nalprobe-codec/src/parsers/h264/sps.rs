//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! 只解析到 `vui_parameters_present_flag` 为止, 目的是得到图像宽高与 sps_id:
//! - Profile / Level
//! - 色度格式 (chroma_format_idc), 仅 High 系列 profile 携带
//! - 图像尺寸 (以宏块为单位, 需要 cropping 调整)
//!
//! 不支持的内容 (scaling list, 未列出的 profile) 直接返回错误, 不产生部分结果.
//! VUI 参数体从不解析.

use log::trace;
use nalprobe_core::bitreader::BitReader;
use nalprobe_core::{ProbeError, ProbeResult};

/// Baseline profile
const PROFILE_BASELINE: u8 = 66;

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// SPS ID (seq_parameter_set_id)
    pub sps_id: u32,
    /// profile_idc (66=Baseline, 100=High, ...)
    pub profile_idc: u8,
    /// constraint_set 标志位
    pub constraint_set_flags: u8,
    /// level_idc (编码级别, 如 30=3.0, 41=4.1)
    pub level_idc: u8,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4), Baseline 默认为 1
    pub chroma_format_idc: u32,
    /// separate_colour_plane_flag
    pub separate_colour_plane: bool,
    /// pic_width_in_mbs_minus1 + 1
    pub pic_width_in_mbs: u32,
    /// pic_height_in_map_units_minus1 + 1
    pub pic_height_in_map_units: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only: bool,
    /// 左裁剪 (像素, 已按色度采样缩放)
    pub crop_left: u32,
    /// 右裁剪 (像素, 已按色度采样缩放)
    pub crop_right: u32,
    /// 上裁剪 (像素, 已按色度采样缩放)
    pub crop_top: u32,
    /// 下裁剪 (像素, 已按色度采样缩放)
    pub crop_bottom: u32,
    /// 是否存在 VUI 参数 (参数体本身不解析)
    pub vui_present: bool,
    /// 图像宽度 (像素, 已应用 cropping)
    pub width: u32,
    /// 图像高度 (像素, 已应用 cropping)
    pub height: u32,
}

/// profile_idc 决定的字段布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileLayout {
    /// Baseline: sps_id 之后直接是 log2_max_frame_num_minus4
    Baseline,
    /// High 系列: sps_id 之后携带色度格式, 位深与 scaling matrix 字段
    HighFamily,
}

impl ProfileLayout {
    fn from_profile_idc(profile_idc: u8) -> ProbeResult<Self> {
        match profile_idc {
            PROFILE_BASELINE => Ok(Self::Baseline),
            100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 => {
                Ok(Self::HighFamily)
            }
            other => Err(ProbeError::UnsupportedProfile(other)),
        }
    }
}

/// 色度相关字段
#[derive(Debug, Clone, Copy)]
struct ChromaFormat {
    chroma_format_idc: u32,
    separate_colour_plane: bool,
}

impl Default for ChromaFormat {
    fn default() -> Self {
        // 未携带 chroma_format_idc 时推断为 4:2:0
        Self {
            chroma_format_idc: 1,
            separate_colour_plane: false,
        }
    }
}

/// 裁剪偏移 (ue 原始值)
#[derive(Debug, Clone, Copy, Default)]
struct CropOffsets {
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
}

/// 从 RBSP 数据 (已去除 NAL 头部与防竞争字节) 解析 SPS
pub fn parse_sps(rbsp: &[u8]) -> ProbeResult<Sps> {
    let mut br = BitReader::new(rbsp);

    let profile_idc = br.read_bits(8)? as u8;
    let constraint_set_flags = br.read_bits(8)? as u8;
    let level_idc = br.read_bits(8)? as u8;
    let sps_id = br.read_ue()?;

    let chroma = match ProfileLayout::from_profile_idc(profile_idc)? {
        ProfileLayout::Baseline => ChromaFormat::default(),
        ProfileLayout::HighFamily => parse_high_profile_fields(&mut br)?,
    };

    // log2_max_frame_num_minus4
    br.read_ue()?;

    // pic_order_cnt_type
    match br.read_ue()? {
        0 => {
            // log2_max_pic_order_cnt_lsb_minus4
            br.read_ue()?;
        }
        1 => {
            br.skip_bits(1)?; // delta_pic_order_always_zero_flag
            br.read_ue()?; // offset_for_non_ref_pic: se(v)
            br.read_ue()?; // offset_for_top_to_bottom_field: se(v)
            let num_ref_frames_in_poc_cycle = br.read_ue()?;
            // 每个 offset_for_ref_frame 至少占 1 位, 截断的码流会在这里报错
            for _ in 0..num_ref_frames_in_poc_cycle {
                br.read_ue()?;
            }
        }
        _ => {}
    }

    br.read_ue()?; // max_num_ref_frames
    br.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs_minus1 = br.read_ue()?;
    let pic_height_in_map_units_minus1 = br.read_ue()?;
    let frame_mbs_only = br.read_flag()?;
    if !frame_mbs_only {
        br.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }

    br.skip_bits(1)?; // direct_8x8_inference_flag

    let mut crop = CropOffsets::default();
    if br.read_flag()? {
        crop.left = br.read_ue()?;
        crop.right = br.read_ue()?;
        crop.top = br.read_ue()?;
        crop.bottom = br.read_ue()?;
    }

    let vui_present = br.read_flag()?;

    let crop = scale_crop_offsets(crop, chroma, frame_mbs_only)?;
    let (width, height) = picture_size(
        pic_width_in_mbs_minus1,
        pic_height_in_map_units_minus1,
        frame_mbs_only,
        crop,
    )?;

    let sps = Sps {
        sps_id,
        profile_idc,
        constraint_set_flags,
        level_idc,
        chroma_format_idc: chroma.chroma_format_idc,
        separate_colour_plane: chroma.separate_colour_plane,
        pic_width_in_mbs: pic_width_in_mbs_minus1 + 1,
        pic_height_in_map_units: pic_height_in_map_units_minus1 + 1,
        frame_mbs_only,
        crop_left: crop.left,
        crop_right: crop.right,
        crop_top: crop.top,
        crop_bottom: crop.bottom,
        vui_present,
        width,
        height,
    };
    trace!("H.264: 解析 SPS 完成, {:?}", sps);
    Ok(sps)
}

/// 解析 High 系列 profile 独有的字段
fn parse_high_profile_fields(br: &mut BitReader) -> ProbeResult<ChromaFormat> {
    let chroma_format_idc = br.read_ue()?;
    if chroma_format_idc > 3 {
        return Err(ProbeError::InvalidData(format!(
            "H.264: chroma_format_idc 非法, value={}",
            chroma_format_idc
        )));
    }
    let separate_colour_plane = if chroma_format_idc == 3 {
        br.read_flag()?
    } else {
        false
    };

    br.read_ue()?; // bit_depth_luma_minus8
    br.read_ue()?; // bit_depth_chroma_minus8
    br.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

    // seq_scaling_matrix_present_flag
    if br.read_flag()? {
        let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
        let present_flags = br.read_bits(list_count)?;
        if present_flags != 0 {
            return Err(ProbeError::UnsupportedFeature(format!(
                "H.264: SPS 携带 scaling list, seq_scaling_list_present_flag=0b{:0width$b}",
                present_flags,
                width = list_count as usize
            )));
        }
    }

    Ok(ChromaFormat {
        chroma_format_idc,
        separate_colour_plane,
    })
}

/// 按色度采样格式缩放裁剪偏移
///
/// 单色或独立色彩平面只在场编码时缩放垂直方向; 4:2:0 与 4:2:2 水平方向乘 2,
/// 4:2:0 垂直方向再乘 2; 4:4:4 不缩放.
fn scale_crop_offsets(
    crop: CropOffsets,
    chroma: ChromaFormat,
    frame_mbs_only: bool,
) -> ProbeResult<CropOffsets> {
    let (unit_x, unit_y) = if chroma.separate_colour_plane || chroma.chroma_format_idc == 0 {
        (1, if frame_mbs_only { 1 } else { 2 })
    } else {
        match chroma.chroma_format_idc {
            1 => (2, 2),
            2 => (2, 1),
            _ => (1, 1),
        }
    };

    let scale = |value: u32, unit: u32| {
        value
            .checked_mul(unit)
            .ok_or_else(|| ProbeError::InvalidData("H.264: 计算裁剪偏移时发生溢出".into()))
    };

    Ok(CropOffsets {
        left: scale(crop.left, unit_x)?,
        right: scale(crop.right, unit_x)?,
        top: scale(crop.top, unit_y)?,
        bottom: scale(crop.bottom, unit_y)?,
    })
}

/// 计算裁剪后的像素尺寸
fn picture_size(
    pic_width_in_mbs_minus1: u32,
    pic_height_in_map_units_minus1: u32,
    frame_mbs_only: bool,
    crop: CropOffsets,
) -> ProbeResult<(u32, u32)> {
    let overflow = || ProbeError::InvalidData("H.264: 计算图像尺寸时发生溢出".into());

    let raw_width = pic_width_in_mbs_minus1
        .checked_add(1)
        .and_then(|v| v.checked_mul(16))
        .ok_or_else(overflow)?;
    let field_factor = if frame_mbs_only { 1 } else { 2 };
    let raw_height = pic_height_in_map_units_minus1
        .checked_add(1)
        .and_then(|v| v.checked_mul(16))
        .and_then(|v| v.checked_mul(field_factor))
        .ok_or_else(overflow)?;

    let crop_x = crop.left.checked_add(crop.right).ok_or_else(overflow)?;
    let crop_y = crop.top.checked_add(crop.bottom).ok_or_else(overflow)?;
    if crop_x > raw_width || crop_y > raw_height {
        return Err(ProbeError::InvalidData(format!(
            "H.264: 裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
            raw_width, raw_height, crop_x, crop_y
        )));
    }

    Ok((raw_width - crop_x, raw_height - crop_y))
}
