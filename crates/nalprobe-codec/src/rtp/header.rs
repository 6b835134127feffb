//! RTP 固定头部与包解析 (RFC 3550).

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use log::trace;
use nalprobe_core::{ProbeError, ProbeResult};

use crate::parsers::h264::{RtpVideoInfo, parse_rtp_video};

/// RTP 固定头部长度 (字节)
pub const RTP_HEADER_SIZE: usize = 12;
/// 唯一支持的 RTP 版本号
pub const RTP_VERSION: u8 = 2;

//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                           timestamp                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           synchronization source (SSRC) identifier            |
// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
// |            contributing source (CSRC) identifiers             |
// |                             ....                              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// RTP 头部扩展
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpExtension {
    /// 扩展 profile (如 0xBEDE 表示 one-byte header)
    pub profile: u16,
    /// 扩展数据, 长度为 4 的整数倍
    pub payload: Vec<u8>,
}

/// RTP 头部
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrcs: Vec<u32>,
    pub extension: Option<RtpExtension>,
    /// 头部总长度 (含 CSRC 与扩展), 即载荷的起始偏移
    pub header_len: usize,
    /// 包尾填充长度 (含最后一个长度字节), 无填充时为 0
    pub padding_len: usize,
}

impl RtpHeader {
    /// 从完整 RTP 包解析头部
    pub fn parse(raw: &[u8]) -> ProbeResult<Self> {
        if raw.len() < RTP_HEADER_SIZE {
            return Err(ProbeError::TruncatedInput);
        }

        let version = raw[0] >> 6;
        if version != RTP_VERSION {
            return Err(ProbeError::InvalidData(format!(
                "RTP: 不支持的版本号 {}",
                version
            )));
        }
        let padding = (raw[0] >> 5) & 0x01 != 0;
        let has_extension = (raw[0] >> 4) & 0x01 != 0;
        let csrc_count = usize::from(raw[0] & 0x0F);
        let marker = raw[1] >> 7 != 0;
        let payload_type = raw[1] & 0x7F;
        let sequence_number = BigEndian::read_u16(&raw[2..4]);
        let timestamp = BigEndian::read_u32(&raw[4..8]);
        let ssrc = BigEndian::read_u32(&raw[8..12]);

        let mut offset = RTP_HEADER_SIZE;
        if raw.len() < offset + csrc_count * 4 {
            return Err(ProbeError::TruncatedInput);
        }
        let csrcs = raw[offset..offset + csrc_count * 4]
            .chunks_exact(4)
            .map(BigEndian::read_u32)
            .collect();
        offset += csrc_count * 4;

        let extension = if has_extension {
            if raw.len() < offset + 4 {
                return Err(ProbeError::TruncatedInput);
            }
            let profile = BigEndian::read_u16(&raw[offset..offset + 2]);
            let ext_len = usize::from(BigEndian::read_u16(&raw[offset + 2..offset + 4])) * 4;
            offset += 4;
            if raw.len() < offset + ext_len {
                return Err(ProbeError::TruncatedInput);
            }
            let payload = raw[offset..offset + ext_len].to_vec();
            offset += ext_len;
            Some(RtpExtension { profile, payload })
        } else {
            None
        };

        let padding_len = if padding {
            // 最后一个字节为填充长度, 由上方检查保证 raw 非空
            let len = usize::from(raw[raw.len() - 1]);
            if len == 0 || offset + len > raw.len() {
                return Err(ProbeError::InvalidData(format!(
                    "RTP: 填充长度非法, padding={}, header_len={}, packet_len={}",
                    len,
                    offset,
                    raw.len()
                )));
            }
            len
        } else {
            0
        };

        Ok(Self {
            version,
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrcs,
            extension,
            header_len: offset,
            padding_len,
        })
    }
}

/// 借用自原始缓冲区的 RTP 包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    pub header: RtpHeader,
    /// 载荷 (不含头部与尾部填充)
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// 解析一个完整的 RTP 包
    pub fn parse(raw: &'a [u8]) -> ProbeResult<Self> {
        let header = RtpHeader::parse(raw)?;
        let payload = &raw[header.header_len..raw.len() - header.padding_len];
        trace!(
            "RTP: seq={}, ts={}, pt={}, payload_len={}",
            header.sequence_number,
            header.timestamp,
            header.payload_type,
            payload.len()
        );
        Ok(Self { header, payload })
    }

    /// 把载荷当作 H.264 NAL 数据解析
    pub fn parse_video(&self) -> ProbeResult<RtpVideoInfo> {
        parse_rtp_video(self.payload)
    }
}

impl fmt::Display for RtpPacket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RTP[pt={}, seq={}, ts={}, ssrc=0x{:08x}, marker={}, payload={}]",
            self.header.payload_type,
            self.header.sequence_number,
            self.header.timestamp,
            self.header.ssrc,
            self.header.marker,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_header(first: u8, second: u8, seq: u16, ts: u32, ssrc: u32) -> Vec<u8> {
        let mut raw = vec![first, second];
        raw.extend_from_slice(&seq.to_be_bytes());
        raw.extend_from_slice(&ts.to_be_bytes());
        raw.extend_from_slice(&ssrc.to_be_bytes());
        raw
    }

    #[test]
    fn test_parse_basic_header() {
        let mut raw = fixed_header(0x80, 0xE0, 0x1234, 90000, 0xDEADBEEF);
        raw.extend_from_slice(&[0x09, 0xF0, 0x00, 0x00]);

        let pkt = RtpPacket::parse(&raw).unwrap();
        assert_eq!(pkt.header.version, 2);
        assert!(pkt.header.marker);
        assert_eq!(pkt.header.payload_type, 96);
        assert_eq!(pkt.header.sequence_number, 0x1234);
        assert_eq!(pkt.header.timestamp, 90000);
        assert_eq!(pkt.header.ssrc, 0xDEADBEEF);
        assert!(pkt.header.csrcs.is_empty());
        assert_eq!(pkt.header.header_len, 12);
        assert_eq!(pkt.payload, &[0x09, 0xF0, 0x00, 0x00]);
    }

    #[test]
    fn test_parse_csrc_and_extension() {
        // CC=2, X=1
        let mut raw = fixed_header(0x92, 0x60, 7, 1, 2);
        raw.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 2]);
        raw.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01, 0x10, 0xAA, 0x00, 0x00]);
        raw.extend_from_slice(&[0x41, 0x9A]);

        let pkt = RtpPacket::parse(&raw).unwrap();
        assert_eq!(pkt.header.csrcs, vec![1, 2]);
        let ext = pkt.header.extension.as_ref().expect("应解析出头部扩展");
        assert_eq!(ext.profile, 0xBEDE);
        assert_eq!(ext.payload, vec![0x10, 0xAA, 0x00, 0x00]);
        assert_eq!(pkt.header.header_len, 12 + 8 + 8);
        assert_eq!(pkt.payload, &[0x41, 0x9A]);
    }

    #[test]
    fn test_parse_padding_stripped() {
        let mut raw = fixed_header(0xA0, 0x60, 1, 1, 1);
        raw.extend_from_slice(&[0x65, 0x88, 0x84, 0x00, 0x00, 0x00, 0x03]);
        let pkt = RtpPacket::parse(&raw).unwrap();
        assert_eq!(pkt.header.padding_len, 3);
        assert_eq!(pkt.payload, &[0x65, 0x88, 0x84, 0x00]);
    }

    #[test]
    fn test_reject_invalid_padding() {
        let mut raw = fixed_header(0xA0, 0x60, 1, 1, 1);
        raw.extend_from_slice(&[0x65, 0x10]);
        let err = RtpPacket::parse(&raw).expect_err("填充长度超过包长应失败");
        assert!(matches!(err, ProbeError::InvalidData(_)));
    }

    #[test]
    fn test_reject_truncated() {
        assert_eq!(
            RtpHeader::parse(&[0x80, 0x60, 0x00]),
            Err(ProbeError::TruncatedInput)
        );
        // CC=1 但没有 CSRC 数据
        let raw = fixed_header(0x81, 0x60, 1, 1, 1);
        assert_eq!(RtpHeader::parse(&raw), Err(ProbeError::TruncatedInput));
        // 扩展长度声明 2 个字, 实际只有 1 个
        let mut raw = fixed_header(0x90, 0x60, 1, 1, 1);
        raw.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x02, 0, 0, 0, 0]);
        assert_eq!(RtpHeader::parse(&raw), Err(ProbeError::TruncatedInput));
    }

    #[test]
    fn test_reject_wrong_version() {
        let raw = fixed_header(0x40, 0x60, 1, 1, 1);
        let err = RtpHeader::parse(&raw).expect_err("版本号 1 应失败");
        assert!(format!("{err}").contains("版本"));
    }

    #[test]
    fn test_parse_video_uses_payload() {
        let mut raw = fixed_header(0x80, 0x60, 1, 1, 1);
        raw.extend_from_slice(&[0x09, 0xF0, 0x00, 0x00]);
        let pkt = RtpPacket::parse(&raw).unwrap();
        assert_eq!(pkt.parse_video().unwrap().nal_type, 9);

        let mut raw = fixed_header(0x80, 0x60, 1, 1, 1);
        raw.push(0x41);
        let pkt = RtpPacket::parse(&raw).unwrap();
        assert_eq!(pkt.parse_video(), Err(ProbeError::InvalidSize(1)));
    }

    #[test]
    fn test_display() {
        let mut raw = fixed_header(0x80, 0x60, 5, 6, 0xAB);
        raw.push(0x41);
        let pkt = RtpPacket::parse(&raw).unwrap();
        assert_eq!(
            pkt.to_string(),
            "RTP[pt=96, seq=5, ts=6, ssrc=0x000000ab, marker=false, payload=1]"
        );
    }
}
