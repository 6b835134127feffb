//! 比特流读取器.
//!
//! 提供从字节缓冲区中按位读取数据的能力, 是 SPS/PPS/切片头解析的基础设施.
//!
//! 按大端位序读取 (MSB first). 所有读取都做边界检查, 越界返回
//! [`ProbeError::TruncatedInput`], 绝不读出缓冲区之外.

use crate::{ProbeError, ProbeResult};

/// 比特流读取器
///
/// 游标只属于一次解析调用, 不在调用之间共享或保存.
///
/// # 示例
/// ```
/// use nalprobe_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_ue().unwrap(), 1);
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> ProbeResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(ProbeError::TruncatedInput);
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效. 剩余位数不足时游标保持不动.
    pub fn read_bits(&mut self, n: u32) -> ProbeResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(ProbeError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(ProbeError::TruncatedInput);
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            // to_read 可能为 8, u32 左移 8 位安全
            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        Ok(result)
    }

    /// 读取无符号 Exp-Golomb 编码值 ue(v)
    ///
    /// 统计前导零个数 `zeros` 直到读到 1, 再读取 `zeros` 位后缀,
    /// 返回 `(1 << zeros) + suffix - 1`. 前导零超过 31 个时结果无法用 u32 表示.
    pub fn read_ue(&mut self) -> ProbeResult<u32> {
        let mut leading_zeros = 0u32;
        loop {
            let bit = self.read_bit()?;
            if bit == 1 {
                break;
            }
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(ProbeError::InvalidData(
                    "Exp-Golomb 前导零过多, leading_zeros > 31".into(),
                ));
            }
        }

        if leading_zeros == 0 {
            return Ok(0);
        }

        let suffix = self.read_bits(leading_zeros)?;
        // leading_zeros == 31 时 (1 << 31) - 1 + suffix 最大为 u32::MAX - 1
        Ok((1u32 << leading_zeros) - 1 + suffix)
    }

    /// 读取 1 位标志
    pub fn read_flag(&mut self) -> ProbeResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> ProbeResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(ProbeError::TruncatedInput);
        }

        let total_bits = self.bit_pos as u32 + n;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;

        Ok(())
    }
}
