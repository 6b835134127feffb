//! 测试用码流构造工具.

use nalprobe_core::BitWriter;

/// 构造 SPS RBSP 所需的字段
pub(crate) struct SpsFields {
    pub profile_idc: u8,
    pub level_idc: u8,
    pub sps_id: u32,
    /// `Some` 时写入 High 系列字段
    pub chroma_format_idc: Option<u32>,
    pub separate_colour_plane: bool,
    /// `Some` 时 seq_scaling_matrix_present_flag=1, 并写入对应的 list 标志
    pub scaling_list_flags: Option<u32>,
    pub poc_type: u32,
    pub poc_cycle: Vec<i32>,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_only: bool,
    pub crop: Option<(u32, u32, u32, u32)>,
    pub vui_present: bool,
}

impl SpsFields {
    pub fn baseline() -> Self {
        Self {
            profile_idc: 66,
            level_idc: 30,
            sps_id: 0,
            chroma_format_idc: None,
            separate_colour_plane: false,
            scaling_list_flags: None,
            poc_type: 0,
            poc_cycle: Vec::new(),
            pic_width_in_mbs_minus1: 10,
            pic_height_in_map_units_minus1: 7,
            frame_mbs_only: true,
            crop: None,
            vui_present: false,
        }
    }
}

/// 按字段构造 SPS RBSP (不含 NAL 头部), 末尾带 rbsp_stop_one_bit
pub(crate) fn build_sps_rbsp(f: &SpsFields) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(u32::from(f.profile_idc), 8);
    bw.write_bits(0, 8); // constraint_set flags
    bw.write_bits(u32::from(f.level_idc), 8);
    bw.write_ue(f.sps_id);

    if let Some(chroma_format_idc) = f.chroma_format_idc {
        bw.write_ue(chroma_format_idc);
        if chroma_format_idc == 3 {
            bw.write_flag(f.separate_colour_plane);
        }
        bw.write_ue(0); // bit_depth_luma_minus8
        bw.write_ue(0); // bit_depth_chroma_minus8
        bw.write_flag(false); // qpprime_y_zero_transform_bypass_flag
        match f.scaling_list_flags {
            Some(flags) => {
                bw.write_flag(true);
                let count = if chroma_format_idc == 3 { 12 } else { 8 };
                bw.write_bits(flags, count);
            }
            None => bw.write_flag(false),
        }
    }

    bw.write_ue(0); // log2_max_frame_num_minus4
    bw.write_ue(f.poc_type);
    match f.poc_type {
        0 => bw.write_ue(0),
        1 => {
            bw.write_flag(false);
            bw.write_se(-1);
            bw.write_se(2);
            bw.write_ue(f.poc_cycle.len() as u32);
            for &offset in &f.poc_cycle {
                bw.write_se(offset);
            }
        }
        _ => {}
    }

    bw.write_ue(1); // max_num_ref_frames
    bw.write_flag(false); // gaps_in_frame_num_value_allowed_flag
    bw.write_ue(f.pic_width_in_mbs_minus1);
    bw.write_ue(f.pic_height_in_map_units_minus1);
    bw.write_flag(f.frame_mbs_only);
    if !f.frame_mbs_only {
        bw.write_flag(false); // mb_adaptive_frame_field_flag
    }
    bw.write_flag(true); // direct_8x8_inference_flag

    match f.crop {
        Some((left, right, top, bottom)) => {
            bw.write_flag(true);
            bw.write_ue(left);
            bw.write_ue(right);
            bw.write_ue(top);
            bw.write_ue(bottom);
        }
        None => bw.write_flag(false),
    }
    bw.write_flag(f.vui_present);

    bw.write_bit(1); // rbsp_stop_one_bit
    bw.finish()
}
