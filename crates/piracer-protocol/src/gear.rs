//! 挡位与驾驶模式枚举
//!
//! `GearPosition` 是挡位状态机发布的绝对挡位；`DriveMode` 是由它
//! 派生的驾驶模式标签，供仪表盘与控制回路消费。

use std::fmt;

use crate::ProtocolError;

/// 手动挡最高挡位
pub const MANUAL_GEAR_MAX: u8 = 8;

/// 绝对挡位
///
/// 上电后的初始值是 `Unknown`，在第一个可解析的拨杆/手柄事件
/// 之前不会出现其他值。`Manual` 的挡位号固定在 1..=8。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GearPosition {
    /// 驻车（仅可通过驻车按钮进入）
    Park,
    /// 倒挡
    Reverse,
    /// 空挡
    Neutral,
    /// 前进挡
    Drive,
    /// 手动挡（1..=8）
    Manual(u8),
    /// 未知（上电初始态）
    Unknown,
}

impl GearPosition {
    /// 构造手动挡位，越界时返回 `InvalidValue`
    pub fn manual(level: u8) -> Result<Self, ProtocolError> {
        if (1..=MANUAL_GEAR_MAX).contains(&level) {
            Ok(GearPosition::Manual(level))
        } else {
            Err(ProtocolError::InvalidValue {
                field: "manual_gear".to_string(),
                value: level,
            })
        }
    }

    /// 派生驾驶模式标签
    pub fn drive_mode(&self) -> DriveMode {
        match self {
            GearPosition::Park => DriveMode::Park,
            GearPosition::Reverse => DriveMode::Reverse,
            GearPosition::Neutral => DriveMode::Neutral,
            GearPosition::Drive => DriveMode::Drive,
            GearPosition::Manual(_) => DriveMode::Manual,
            GearPosition::Unknown => DriveMode::Unknown,
        }
    }

    /// 是否允许动力输出（前进或倒车）
    pub fn allows_traction(&self) -> bool {
        matches!(
            self,
            GearPosition::Drive | GearPosition::Manual(_) | GearPosition::Reverse
        )
    }
}

impl Default for GearPosition {
    fn default() -> Self {
        GearPosition::Unknown
    }
}

impl fmt::Display for GearPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GearPosition::Park => write!(f, "P"),
            GearPosition::Reverse => write!(f, "R"),
            GearPosition::Neutral => write!(f, "N"),
            GearPosition::Drive => write!(f, "D"),
            GearPosition::Manual(n) => write!(f, "M{}", n),
            GearPosition::Unknown => write!(f, "--"),
        }
    }
}

/// 驾驶模式标签
///
/// 挡位的粗粒度投影：全部手动挡折叠为 `Manual`。控制回路据此
/// 决定油门方向闸门，仪表盘据此选择模式指示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveMode {
    Park,
    Reverse,
    Neutral,
    Drive,
    Manual,
    #[default]
    Unknown,
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            DriveMode::Park => "PARK",
            DriveMode::Reverse => "REVERSE",
            DriveMode::Neutral => "NEUTRAL",
            DriveMode::Drive => "DRIVE",
            DriveMode::Manual => "MANUAL",
            DriveMode::Unknown => "UNKNOWN",
        };
        write!(f, "{}", tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_constructor_bounds() {
        assert_eq!(GearPosition::manual(1), Ok(GearPosition::Manual(1)));
        assert_eq!(GearPosition::manual(8), Ok(GearPosition::Manual(8)));
        assert!(GearPosition::manual(0).is_err());
        assert!(GearPosition::manual(9).is_err());
    }

    #[test]
    fn test_drive_mode_projection() {
        assert_eq!(GearPosition::Park.drive_mode(), DriveMode::Park);
        assert_eq!(GearPosition::Drive.drive_mode(), DriveMode::Drive);
        assert_eq!(GearPosition::Manual(3).drive_mode(), DriveMode::Manual);
        assert_eq!(GearPosition::Manual(8).drive_mode(), DriveMode::Manual);
        assert_eq!(GearPosition::Unknown.drive_mode(), DriveMode::Unknown);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(GearPosition::Park.to_string(), "P");
        assert_eq!(GearPosition::Manual(5).to_string(), "M5");
        assert_eq!(GearPosition::Unknown.to_string(), "--");
        assert_eq!(DriveMode::Manual.to_string(), "MANUAL");
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(GearPosition::default(), GearPosition::Unknown);
        assert_eq!(DriveMode::default(), DriveMode::Unknown);
    }

    #[test]
    fn test_traction_gate() {
        assert!(GearPosition::Drive.allows_traction());
        assert!(GearPosition::Reverse.allows_traction());
        assert!(GearPosition::Manual(2).allows_traction());
        assert!(!GearPosition::Park.allows_traction());
        assert!(!GearPosition::Neutral.allows_traction());
        assert!(!GearPosition::Unknown.allows_traction());
    }
}
