//! PiRacer SDK - 车载遥测与控制 Rust SDK
//!
//! 把拨杆 CAN 总线、霍尔轮速与手柄输入整合成一套分层 SDK，
//! 从底层到高层：
//!
//! - **CAN 层** (`can`): CAN 硬件抽象，支持 SocketCAN 与 Mock
//! - **协议层** (`protocol`): 帧编解码、校验和、挡位/速度类型
//! - **驱动层** (`driver`): IO 线程、挡位状态机、轮速估计、共享状态
//! - **控制层** (`control`): 手柄控制回路与输出端抽象
//!
//! # 快速开始
//!
//! ```rust
//! use piracer_sdk::prelude::*;
//! ```
//!
//! 典型接线（Linux 上用真实总线时）：
//!
//! ```rust,ignore
//! use piracer_sdk::can::SocketCanAdapter;
//! use piracer_sdk::prelude::*;
//!
//! let adapter = SocketCanAdapter::new("can0")?;
//! let piracer = Piracer::new(adapter, None);
//! piracer.wait_for_feedback(std::time::Duration::from_secs(2))?;
//! println!("{:?}", piracer.snapshot());
//! ```

// 分层模块（各层独立成 crate，在此统一挂载）
pub use piracer_can as can;
pub use piracer_control as control;
pub use piracer_driver as driver;
pub use piracer_protocol as protocol;

// Prelude 模块
pub mod prelude;

// 常用类型平铺导出，省去子模块路径

// CAN 层常用类型
pub use piracer_can::{CanAdapter, CanError};

// 协议层常用类型
pub use piracer_protocol::{DriveMode, GearPosition, PiracerFrame, ProtocolError, VelocityReading};

// 驱动层（车辆实例与快照是大多数用户的入口点）
pub use piracer_driver::{
    DriverError, Piracer, PiracerConfig, PiracerContext, VehicleSnapshot,
};

// 控制层
pub use piracer_control::{ControlConfig, ControlError, ControlStats, control_loop};
