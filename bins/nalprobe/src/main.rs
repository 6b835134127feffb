//! nalprobe - H.264 码流元数据探测工具
//!
//! 逐个 NAL 单元提取图像尺寸与参数集 ID, 报告分辨率变化.
//! 输入可以是 Annex B 裸码流, RFC 4571 分帧的 RTP 转储, 或单个十六进制载荷.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::process;

use anyhow::{Context, Result, bail};
use byteorder::{BigEndian, ByteOrder};
use clap::{Parser, ValueEnum};
use log::{debug, warn};
use serde::Serialize;

use nalprobe_codec::parsers::h264::{RtpVideoInfo, parse_rtp_video, split_annex_b};
use nalprobe_codec::rtp::{RtpPacket, seq};
use nalprobe_core::ProbeError;

/// H.264 码流元数据探测工具
#[derive(Parser, Debug)]
#[command(name = "nalprobe", version, about = "纯 Rust H.264 码流元数据探测工具")]
struct Cli {
    /// 输入文件路径
    input: Option<String>,

    /// 输入文件格式
    #[arg(long, value_enum, default_value_t = InputFormat::Annexb)]
    format: InputFormat,

    /// 直接探测一个十六进制编码的 NAL 载荷 (忽略输入文件)
    #[arg(long, value_name = "HEX")]
    hex: Option<String>,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 静默模式 (只输出探测结果)
    #[arg(short, long)]
    quiet: bool,
}

/// 输入文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// Annex B 字节流 (起始码分隔)
    Annexb,
    /// RFC 4571 分帧的 RTP 包 (2 字节大端长度 + RTP 包)
    Rtp,
}

// ============================================================
// 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize, Debug, Default)]
struct ProbeReport {
    source: String,
    nal_units: u64,
    /// NAL 类型 -> 出现次数
    nal_types: BTreeMap<u8, u64>,
    /// 超出可解析长度范围而跳过的单元数
    skipped_out_of_range: u64,
    errors: Vec<UnitError>,
    resolutions: Vec<ResolutionChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rtp: Option<RtpSummary>,
}

/// 单元解析错误
#[derive(Serialize, Debug, PartialEq, Eq)]
struct UnitError {
    index: u64,
    message: String,
}

/// 分辨率变化事件
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
struct ResolutionChange {
    index: u64,
    sps_id: u32,
    width: u32,
    height: u32,
}

/// RTP 包统计
#[derive(Serialize, Debug, Default, PartialEq, Eq)]
struct RtpSummary {
    packets: u64,
    invalid_packets: u64,
    /// 序列号跳变 (丢包或乱序) 次数
    seq_gaps: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    highest_seq: Option<u16>,
}

// ============================================================
// 探测逻辑
// ============================================================

/// 逐个单元累积探测结果
struct Prober {
    report: ProbeReport,
    /// sps_id -> 最近一次的 (宽, 高)
    last_resolution: HashMap<u32, (u32, u32)>,
}

impl Prober {
    fn new(source: impl Into<String>) -> Self {
        Self {
            report: ProbeReport {
                source: source.into(),
                ..ProbeReport::default()
            },
            last_resolution: HashMap::new(),
        }
    }

    /// 探测一个 NAL 载荷 (单个 NAL 或聚合包)
    fn probe_unit(&mut self, data: &[u8]) {
        let index = self.report.nal_units;
        self.report.nal_units += 1;
        if let Some(&header) = data.first() {
            *self.report.nal_types.entry(header & 0x1F).or_default() += 1;
        }

        match parse_rtp_video(data) {
            Ok(info) => self.record(index, &info),
            Err(ProbeError::InvalidSize(len)) => {
                debug!("跳过 #{index}: 长度 {len} 超出可解析范围");
                self.report.skipped_out_of_range += 1;
            }
            Err(e) => {
                warn!("解析 #{index} 失败: {e}");
                self.report.errors.push(UnitError {
                    index,
                    message: e.to_string(),
                });
            }
        }
    }

    /// 同一 sps_id 的尺寸与上次不同时记录一次分辨率变化
    fn record(&mut self, index: u64, info: &RtpVideoInfo) {
        let (Some(dims), Some(sps_id)) = (info.dimensions, info.sps_id) else {
            return;
        };
        let current = (dims.width, dims.height);
        if self.last_resolution.insert(sps_id, current) != Some(current) {
            self.report.resolutions.push(ResolutionChange {
                index,
                sps_id,
                width: dims.width,
                height: dims.height,
            });
        }
    }

    fn finish(self) -> ProbeReport {
        self.report
    }
}

/// 探测 Annex B 字节流
fn probe_annex_b(source: &str, data: &[u8]) -> ProbeReport {
    let mut prober = Prober::new(source);
    for nalu in split_annex_b(data) {
        prober.probe_unit(nalu.data);
    }
    prober.finish()
}

/// RFC 4571 帧长度前缀大小
const FRAME_LENGTH_SIZE: usize = 2;

/// 探测 RFC 4571 分帧的 RTP 转储
fn probe_rtp_stream(source: &str, data: &[u8]) -> Result<ProbeReport> {
    let mut prober = Prober::new(source);
    let mut summary = RtpSummary::default();
    let mut pos = 0;

    while pos < data.len() {
        if data.len() - pos < FRAME_LENGTH_SIZE {
            bail!("RTP 帧长度前缀被截断, offset={pos}");
        }
        let frame_len = usize::from(BigEndian::read_u16(&data[pos..pos + FRAME_LENGTH_SIZE]));
        pos += FRAME_LENGTH_SIZE;
        let frame = data.get(pos..pos + frame_len).with_context(|| {
            format!(
                "RTP 帧被截断, offset={pos}, 声明长度={frame_len}, 剩余={}",
                data.len() - pos
            )
        })?;
        pos += frame_len;

        summary.packets += 1;
        let packet = match RtpPacket::parse(frame) {
            Ok(p) => p,
            Err(e) => {
                warn!("RTP 包 #{} 解析失败: {e}", summary.packets - 1);
                summary.invalid_packets += 1;
                continue;
            }
        };
        debug!("{packet}");

        let seq_num = packet.header.sequence_number;
        if let Some(prev) = summary.highest_seq {
            if seq_num != prev.wrapping_add(1) {
                debug!("序列号跳变: {prev} -> {seq_num}");
                summary.seq_gaps += 1;
            }
            summary.highest_seq = Some(seq::latest_seq(seq_num, prev));
        } else {
            summary.highest_seq = Some(seq_num);
        }

        prober.probe_unit(packet.payload);
    }

    let mut report = prober.finish();
    report.rtp = Some(summary);
    Ok(report)
}

/// 探测单个十六进制载荷
fn probe_hex(hex_str: &str) -> Result<ProbeReport> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
    let payload = hex::decode(&cleaned).context("十六进制载荷解码失败")?;
    let mut prober = Prober::new("<hex>");
    prober.probe_unit(&payload);
    Ok(prober.finish())
}

fn run(cli: &Cli) -> Result<Option<ProbeReport>> {
    if let Some(ref hex_str) = cli.hex {
        return probe_hex(hex_str).map(Some);
    }
    let Some(ref input_path) = cli.input else {
        return Ok(None);
    };

    if !cli.quiet {
        eprintln!(
            "nalprobe 版本 {} -- 纯 Rust H.264 码流探测工具",
            env!("CARGO_PKG_VERSION")
        );
        eprintln!("输入文件: {input_path} ({:?})", cli.format);
    }

    let data = fs::read(input_path).with_context(|| format!("无法打开文件 '{input_path}'"))?;
    let report = match cli.format {
        InputFormat::Annexb => probe_annex_b(input_path, &data),
        InputFormat::Rtp => probe_rtp_stream(input_path, &data)?,
    };
    Ok(Some(report))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let report = match run(&cli) {
        Ok(Some(report)) => report,
        Ok(None) => {
            print_banner();
            return;
        }
        Err(e) => {
            eprintln!("错误: {e:#}");
            process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("错误: JSON 序列化失败: {e}");
                process::exit(1);
            }
        }
    } else {
        print_report_text(&report);
    }
}

// ============================================================
// 文本输出
// ============================================================

fn print_banner() {
    println!("nalprobe {}", env!("CARGO_PKG_VERSION"));
    println!("用法: nalprobe <INPUT> [--format annexb|rtp] [--json]");
    println!("      nalprobe --hex <HEX>");
}

fn print_report_text(report: &ProbeReport) {
    println!("[SOURCE]");
    println!("  输入         : {}", report.source);
    println!("  NAL 单元数   : {}", report.nal_units);
    for (nal_type, count) in &report.nal_types {
        println!("  类型 {nal_type:<2}      : {count}");
    }
    if report.skipped_out_of_range > 0 {
        println!("  长度越界跳过 : {}", report.skipped_out_of_range);
    }
    println!("[/SOURCE]");
    println!();

    if let Some(ref rtp) = report.rtp {
        println!("[RTP]");
        println!("  包数         : {}", rtp.packets);
        println!("  无效包       : {}", rtp.invalid_packets);
        println!("  序列号跳变   : {}", rtp.seq_gaps);
        println!("[/RTP]");
        println!();
    }

    for change in &report.resolutions {
        println!(
            "[RESOLUTION] #{} sps_id={} {}x{}",
            change.index, change.sps_id, change.width, change.height
        );
    }
    for err in &report.errors {
        println!("[ERROR] #{} {}", err.index, err.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalprobe_core::BitWriter;
    use std::io::Write;

    /// 构造 Baseline SPS NAL (含头部字节)
    fn baseline_sps_nal(sps_id: u32, width_mbs: u32, height_mbs: u32) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(66, 8);
        bw.write_bits(0xC0, 8);
        bw.write_bits(30, 8);
        bw.write_ue(sps_id);
        bw.write_ue(0); // log2_max_frame_num_minus4
        bw.write_ue(2); // pic_order_cnt_type
        bw.write_ue(1); // max_num_ref_frames
        bw.write_flag(false);
        bw.write_ue(width_mbs - 1);
        bw.write_ue(height_mbs - 1);
        bw.write_flag(true); // frame_mbs_only_flag
        bw.write_flag(true); // direct_8x8_inference_flag
        bw.write_flag(false); // frame_cropping_flag
        bw.write_flag(false); // vui_parameters_present_flag
        bw.write_bit(1);
        let mut nal = vec![0x67];
        nal.extend(bw.finish());
        nal
    }

    fn annex_b(units: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for unit in units {
            out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            out.extend_from_slice(unit);
        }
        out
    }

    fn rtp_frame(seq_num: u16, payload: &[u8]) -> Vec<u8> {
        let mut packet = vec![0x80, 0x60];
        packet.extend_from_slice(&seq_num.to_be_bytes());
        packet.extend_from_slice(&1000u32.to_be_bytes());
        packet.extend_from_slice(&0x1234u32.to_be_bytes());
        packet.extend_from_slice(payload);

        let mut frame = (packet.len() as u16).to_be_bytes().to_vec();
        frame.extend(packet);
        frame
    }

    #[test]
    fn test_annex_b_resolution_changes() {
        let sps_small = baseline_sps_nal(0, 11, 8);
        let sps_large = baseline_sps_nal(0, 20, 15);
        let aud = [0x09, 0xF0, 0x00, 0x00];
        let stream = annex_b(&[&sps_small[..], &aud[..], &sps_small[..], &sps_large[..]]);

        let report = probe_annex_b("test", &stream);
        assert_eq!(report.nal_units, 4);
        assert_eq!(report.nal_types.get(&7), Some(&3));
        assert_eq!(report.nal_types.get(&9), Some(&1));
        assert_eq!(
            report.resolutions,
            vec![
                ResolutionChange {
                    index: 0,
                    sps_id: 0,
                    width: 176,
                    height: 128
                },
                ResolutionChange {
                    index: 3,
                    sps_id: 0,
                    width: 320,
                    height: 240
                },
            ],
            "重复的 SPS 不应产生新的分辨率事件"
        );
    }

    #[test]
    fn test_annex_b_out_of_range_unit_skipped() {
        let mut idr = vec![0x65];
        idr.extend(std::iter::repeat_n(0xAA, 2000));
        let report = probe_annex_b("test", &annex_b(&[&idr[..]]));
        assert_eq!(report.skipped_out_of_range, 1);
        assert!(report.errors.is_empty());
        assert_eq!(report.nal_types.get(&5), Some(&1));
    }

    #[test]
    fn test_annex_b_parse_error_reported() {
        let mut main_profile = baseline_sps_nal(0, 11, 8);
        main_profile[1] = 77;
        let report = probe_annex_b("test", &annex_b(&[&main_profile[..]]));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("77"));
    }

    #[test]
    fn test_rtp_stream_seq_gaps() {
        let sps = baseline_sps_nal(1, 11, 8);
        let aud = [0x09, 0xF0, 0x00, 0x00];
        let mut data = rtp_frame(0xFFFE, &sps);
        data.extend(rtp_frame(0xFFFF, &aud));
        data.extend(rtp_frame(0x0000, &aud));
        data.extend(rtp_frame(0x0003, &aud));

        let report = probe_rtp_stream("test", &data).unwrap();
        let rtp = report.rtp.expect("RTP 模式应包含统计");
        assert_eq!(rtp.packets, 4);
        assert_eq!(rtp.seq_gaps, 1, "只有 0 -> 3 属于跳变");
        assert_eq!(rtp.highest_seq, Some(3));
        assert_eq!(report.resolutions.len(), 1);
        assert_eq!(report.resolutions[0].sps_id, 1);
    }

    #[test]
    fn test_rtp_stream_invalid_packet_counted() {
        let mut data = vec![0x00, 0x03, 0x80, 0x60, 0x00];
        data.extend(rtp_frame(1, &[0x09, 0xF0, 0x00, 0x00]));
        let report = probe_rtp_stream("test", &data).unwrap();
        let rtp = report.rtp.unwrap();
        assert_eq!(rtp.packets, 2);
        assert_eq!(rtp.invalid_packets, 1);
        assert_eq!(report.nal_units, 1);
    }

    #[test]
    fn test_rtp_stream_truncated_frame() {
        let mut data = rtp_frame(1, &[0x09, 0xF0, 0x00, 0x00]);
        data.truncate(data.len() - 1);
        let err = probe_rtp_stream("test", &data).expect_err("截断的帧应失败");
        assert!(format!("{err:#}").contains("截断"));
    }

    #[test]
    fn test_probe_hex() {
        let report = probe_hex("09 f0 00 00").unwrap();
        assert_eq!(report.nal_types.get(&9), Some(&1));
        assert!(probe_hex("zz").is_err());
    }

    #[test]
    fn test_run_reads_file() {
        let sps = baseline_sps_nal(0, 11, 8);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&annex_b(&[&sps[..]])).unwrap();

        let cli = Cli::parse_from([
            "nalprobe",
            file.path().to_str().unwrap(),
            "--quiet",
            "--json",
        ]);
        let report = run(&cli).unwrap().expect("指定输入时应产生报告");
        assert_eq!(report.resolutions.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["resolutions"][0]["width"], 176);
        assert!(json.get("rtp").is_none());
    }

    #[test]
    fn test_run_missing_file() {
        let cli = Cli::parse_from(["nalprobe", "/nonexistent/nalprobe.h264", "-q"]);
        let err = run(&cli).expect_err("文件不存在应失败");
        assert!(format!("{err}").contains("无法打开文件"));
    }

    #[test]
    fn test_cli_format_value() {
        let cli = Cli::parse_from(["nalprobe", "dump.bin", "--format", "rtp"]);
        assert_eq!(cli.format, InputFormat::Rtp);
        assert!(Cli::try_parse_from(["nalprobe", "x", "--format", "mp4"]).is_err());
    }
}
