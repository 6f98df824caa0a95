//! 厂商校验和引擎
//!
//! 拨杆总线是无应答的广播介质，校验和与滚动计数器的耦合是它
//! 对抗位错误和帧重复/丢失的唯一手段：计数器低 4 位参与摘要，
//! 陈旧或重放的计数器值会直接导致校验和不匹配。
//!
//! 算法：CRC-8，多项式 0x1D，初值 0x00，MSB 先行，按消息 ID
//! 查表做最终异或。摘要顺序为「计数器低半字节 → 内容字节」。

use crate::ids;

/// CRC-8 生成多项式
const CRC8_POLY: u8 = 0x1D;

/// 未在种子表中登记的 ID 使用的默认种子
const DEFAULT_SEED: u8 = 0x00;

/// 滚动计数器模数：计数器在 0..=15 内回绕
pub const COUNTER_MODULO: u8 = 16;

/// 查询消息 ID 对应的最终异或种子
///
/// 种子表是协议固定映射；未登记的 ID 返回 [`DEFAULT_SEED`]。
pub fn seed_for_id(message_id: u32) -> u8 {
    match message_id {
        ids::LEVER_FRAME_ID => 0x53,
        ids::LED_FRAME_ID => 0x70,
        _ => DEFAULT_SEED,
    }
}

/// 单字节 CRC-8 迭代（MSB 先行）
fn crc8_update(mut crc: u8, byte: u8) -> u8 {
    crc ^= byte;
    for _ in 0..8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ CRC8_POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// 计算帧校验和
///
/// 对「计数器低半字节 + 内容字节」做 CRC-8，再与消息 ID 的
/// 种子异或。同一 (message_id, content, counter) 三元组的结果
/// 恒定，调用方据此实现发送端签名与接收端验证。
///
/// # 示例
///
/// ```rust
/// use piracer_protocol::{compute_checksum, ids};
///
/// let a = compute_checksum(ids::LEVER_FRAME_ID, &[0x01, 0, 0, 0, 0, 0], 3);
/// let b = compute_checksum(ids::LEVER_FRAME_ID, &[0x01, 0, 0, 0, 0, 0], 3);
/// assert_eq!(a, b);
/// ```
pub fn compute_checksum(message_id: u32, content: &[u8], rolling_counter: u8) -> u8 {
    let mut crc = crc8_update(0x00, rolling_counter & 0x0F);
    for &byte in content {
        crc = crc8_update(crc, byte);
    }
    crc ^ seed_for_id(message_id)
}

/// 滚动计数器步进（0..=15 回绕）
pub fn next_counter(counter: u8) -> u8 {
    counter.wrapping_add(1) % COUNTER_MODULO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let content = [0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
        let a = compute_checksum(ids::LEVER_FRAME_ID, &content, 7);
        let b = compute_checksum(ids::LEVER_FRAME_ID, &content, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_checksum_counter_sensitivity() {
        // 相同内容、不同计数器必须产生不同签名，否则重放检测失效
        let content = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        let with_3 = compute_checksum(ids::LEVER_FRAME_ID, &content, 3);
        let with_4 = compute_checksum(ids::LEVER_FRAME_ID, &content, 4);
        assert_ne!(with_3, with_4);
    }

    #[test]
    fn test_checksum_counter_only_low_nibble() {
        // 计数器仅低 4 位参与摘要
        let content = [0x01, 0x00];
        let low = compute_checksum(ids::LED_FRAME_ID, &content, 0x05);
        let high = compute_checksum(ids::LED_FRAME_ID, &content, 0xF5);
        assert_eq!(low, high);
    }

    #[test]
    fn test_checksum_seed_differs_per_id() {
        let content = [0x20, 0x00, 0x00, 0x00, 0x00, 0x00];
        let lever = compute_checksum(ids::LEVER_FRAME_ID, &content, 0);
        let led = compute_checksum(ids::LED_FRAME_ID, &content, 0);
        let default = compute_checksum(0x123, &content, 0);
        assert_eq!(lever ^ led, 0x53 ^ 0x70);
        assert_eq!(default ^ lever, 0x53);
    }

    #[test]
    fn test_checksum_single_bit_flip_detected() {
        // CRC-8 对任意单比特翻转敏感：逐位翻转内容的每一位都必须改变结果
        let content = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        let reference = compute_checksum(ids::LEVER_FRAME_ID, &content, 9);

        for byte_idx in 0..content.len() {
            for bit in 0..8 {
                let mut flipped = content;
                flipped[byte_idx] ^= 1 << bit;
                let sum = compute_checksum(ids::LEVER_FRAME_ID, &flipped, 9);
                assert_ne!(
                    sum, reference,
                    "flip of byte {} bit {} went undetected",
                    byte_idx, bit
                );
            }
        }
    }

    #[test]
    fn test_next_counter_wraps_at_16() {
        assert_eq!(next_counter(0), 1);
        assert_eq!(next_counter(14), 15);
        assert_eq!(next_counter(15), 0);
    }

    #[test]
    fn test_next_counter_covers_full_range() {
        let mut seen = [false; 16];
        let mut counter = 0u8;
        for _ in 0..16 {
            seen[counter as usize] = true;
            counter = next_counter(counter);
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(counter, 0);
    }
}
