//! Prelude - 常用类型的便捷导入
//!
//! 大多数用户应该使用这个模块来导入常用类型：
//!
//! ```rust
//! use piracer_sdk::prelude::*;
//! ```

// 驱动层（推荐入口）
pub use crate::driver::{
    DashboardConfig, DashboardSink, EdgeSender, GearRequester, MetricsSnapshot, Piracer,
    PiracerConfig, PiracerContext, VehicleSnapshot, dashboard_loop,
};

// 控制层
pub use crate::control::{
    ControlConfig, ControlStats, DriveCommand, DriveOutput, GamepadSample, GamepadSource,
    NullOutput, control_loop,
};

// 协议层常用类型
pub use crate::protocol::{DriveMode, GearPosition, VelocityReading};

// CAN 层（常用 Trait）
pub use crate::can::CanAdapter;

// 错误类型
pub use crate::can::CanError;
pub use crate::control::ControlError;
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;
