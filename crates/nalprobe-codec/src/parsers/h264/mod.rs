//! H.264/AVC 码流解析器.
//!
//! 只提取编码参数, 不解码像素数据:
//! - NAL 单元分割与类型识别 (Annex B, STAP-A)
//! - SPS (Sequence Parameter Set) 解析
//! - PPS (Picture Parameter Set) 解析
//! - 切片头前三个字段
//! - RTP 视频载荷分发

pub mod nal;
pub mod pps;
pub mod rtp_video;
pub mod slice;
pub mod sps;

#[cfg(test)]
pub(crate) mod test_util;

pub use nal::{NalUnit, NalUnitType, split_annex_b, split_stap_a, unescape_rbsp};
pub use pps::{Pps, parse_pps};
pub use rtp_video::{Dimensions, MAX_NAL_SIZE, MIN_NAL_SIZE, RtpVideoInfo, parse_rtp_video};
pub use slice::{SliceHeader, SliceKind, parse_slice_header};
pub use sps::{Sps, parse_sps};
