//! CAN 接口状态检查
//!
//! 打开 socket 前先通过 sysfs 确认接口存在且已启动，
//! 以便给出比系统调用错误码更友好的提示。

use crate::CanError;
use std::path::Path;

/// `IFF_UP`：接口管理状态为 UP（来自 `<linux/if.h>`）
const IFF_UP: u32 = 0x1;

/// 检查 CAN 接口是否存在且已启动
///
/// 读取 `/sys/class/net/<iface>/flags` 并检查 `IFF_UP` 位。
/// 注意不能用 `operstate`：vcan 等虚拟接口的 operstate 恒为
/// "unknown"，而 flags 中的 UP 位是准确的。
///
/// # 返回
/// - `Ok(true)`: 接口存在且已启动
/// - `Ok(false)`: 接口存在但未启动
/// - `Err(CanError::Device)`: 接口不存在
/// - `Err(CanError::Io)`: 读取 sysfs 失败
pub(crate) fn check_interface_status(interface: &str) -> Result<bool, CanError> {
    let sysfs_dir = Path::new("/sys/class/net").join(interface);
    if !sysfs_dir.exists() {
        return Err(CanError::Device(
            format!(
                "CAN interface '{}' does not exist. For a virtual interface, create it with:\n  sudo ip link add dev {} type vcan && sudo ip link set up {}",
                interface, interface, interface
            )
            .into(),
        ));
    }

    let flags_raw = std::fs::read_to_string(sysfs_dir.join("flags")).map_err(CanError::Io)?;
    let flags_str = flags_raw.trim().trim_start_matches("0x");
    let flags = u32::from_str_radix(flags_str, 16).map_err(|e| {
        CanError::Device(
            format!(
                "Failed to parse flags for interface '{}': {} ({})",
                interface, flags_raw.trim(), e
            )
            .into(),
        )
    })?;

    Ok(flags & IFF_UP != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonexistent_interface_is_device_error() {
        let result = check_interface_status("definitely_not_a_can_interface_42");
        assert!(matches!(result, Err(CanError::Device(_))));
    }

    #[test]
    fn test_loopback_interface_is_up() {
        // lo 在所有 Linux 测试环境中都存在且 UP
        let result = check_interface_status("lo");
        assert!(matches!(result, Ok(true)));
    }
}
