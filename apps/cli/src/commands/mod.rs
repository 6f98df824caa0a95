//! 子命令定义与实现

pub mod decode;
pub mod drive;
pub mod monitor;

pub use decode::DecodeArgs;
pub use drive::DriveArgs;
pub use monitor::MonitorArgs;
