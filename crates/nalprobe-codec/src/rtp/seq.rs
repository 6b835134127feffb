//! RTP 序列号与时间戳的回绕比较.
//!
//! 16 位序列号与 32 位时间戳都会回绕, 以差值是否落在半个空间内判断先后.

use std::cmp::Ordering;

const SEQ_HALF: u16 = 0x8000;
const TIMESTAMP_HALF: u32 = 0x8000_0000;

/// `seq` 是否比 `prev` 更新
pub fn is_newer_seq(seq: u16, prev: u16) -> bool {
    let diff = seq.wrapping_sub(prev);
    diff != 0 && diff < SEQ_HALF
}

/// `ts` 是否比 `prev` 更新
pub fn is_newer_timestamp(ts: u32, prev: u32) -> bool {
    let diff = ts.wrapping_sub(prev);
    diff != 0 && diff < TIMESTAMP_HALF
}

/// 两者中较新的序列号
pub fn latest_seq(seq: u16, prev: u16) -> u16 {
    if is_newer_seq(seq, prev) { seq } else { prev }
}

/// 两者中较新的时间戳
pub fn latest_timestamp(ts: u32, prev: u32) -> u32 {
    if is_newer_timestamp(ts, prev) { ts } else { prev }
}

/// 按回绕语义比较两个序列号
pub fn compare_seq(a: u16, b: u16) -> Ordering {
    match a.wrapping_sub(b) {
        0 => Ordering::Equal,
        diff if diff < SEQ_HALF => Ordering::Greater,
        _ => Ordering::Less,
    }
}

/// 两个序列号之间的最短距离 (0..=0x8000)
pub fn seq_distance(a: u16, b: u16) -> u16 {
    let diff = a.wrapping_sub(b);
    if diff <= SEQ_HALF { diff } else { diff.wrapping_neg() }
}

/// `seq` 是否落在 `[start, start + size)` 内 (可跨越回绕点)
pub fn is_seq_in_range(seq: u16, start: u16, size: u16) -> bool {
    let n = u32::from(seq);
    let wrapped = n + (1 << 16);
    let s = u32::from(start);
    let e = s + u32::from(size);
    (s <= n && n < e) || (s <= wrapped && wrapped < e)
}
