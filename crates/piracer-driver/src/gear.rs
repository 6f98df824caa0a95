//! 挡位梯级状态机
//!
//! 物理拨杆只上报瞬时的 UP/DOWN 拨动与驻车按钮，不上报绝对位置，
//! 状态机必须自己维护梯级上的相对位置：
//!
//! ```text
//! R < N < D < M1 < M2 < ... < M8      （P 不在梯级上）
//! ```
//!
//! `Drive` 与最低手动挡共用一个梯级：UP 从 `Drive` 直接进入 `Manual(2)`，
//! DOWN 从 `Manual(1)` 或 `Drive` 都回到 `Neutral`。梯级两端截断：
//! `Reverse` 继续 DOWN、`Manual(8)` 继续 UP 都是无操作，不算错误。
//! `Park` 只能通过驻车类按钮进入（拨杆按钮或手柄 Y 键），但始终可以
//! 通过拨动退出；对拨动而言 `Park` 与 `Unknown` 等同于 `Neutral` 梯级。
//!
//! 两条输入路径（总线拨杆、手柄绝对请求）各自携带滚动计数器，
//! 状态机按来源分别记录最近一次见过的计数器做去重，互不干扰。

use piracer_protocol::{GearPosition, MANUAL_GEAR_MAX, ToggleDirection, ToggleEvent};

/// 手柄路径的绝对挡位请求
///
/// 与拨杆事件不同，绝对请求绕过梯级直接设置目标挡位，但仍受
/// 同一套按来源去重的计数器约束。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GearRequest {
    /// 目标挡位
    pub target: GearPosition,

    /// 请求方滚动计数器（0..=15）
    pub counter: u8,

    /// 请求发出时间戳（微秒，单调时钟）
    pub timestamp_us: u64,
}

/// 一次挡位事件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GearOutcome {
    /// 发生切换，携带新挡位
    Shifted(GearPosition),
    /// 事件有效但挡位未变（梯级端点截断或目标即当前挡位）
    Clamped,
    /// 滚动计数器与该来源最近一次相同，事件按重复丢弃
    Duplicate,
}

/// 梯级 UP 一步
fn ladder_up(position: GearPosition) -> GearPosition {
    match position {
        GearPosition::Reverse => GearPosition::Neutral,
        // Park/Unknown 对拨动视同 Neutral 梯级
        GearPosition::Neutral | GearPosition::Park | GearPosition::Unknown => GearPosition::Drive,
        // Drive 占据最低手动梯级
        GearPosition::Drive => GearPosition::Manual(2),
        GearPosition::Manual(n) if n < MANUAL_GEAR_MAX => GearPosition::Manual(n + 1),
        GearPosition::Manual(_) => GearPosition::Manual(MANUAL_GEAR_MAX),
    }
}

/// 梯级 DOWN 一步
fn ladder_down(position: GearPosition) -> GearPosition {
    match position {
        GearPosition::Reverse => GearPosition::Reverse,
        GearPosition::Neutral | GearPosition::Park | GearPosition::Unknown => GearPosition::Reverse,
        GearPosition::Drive | GearPosition::Manual(1) => GearPosition::Neutral,
        GearPosition::Manual(n) if n > 1 => GearPosition::Manual(n - 1),
        GearPosition::Manual(_) => GearPosition::Neutral,
    }
}

/// 挡位梯级状态机
///
/// 单写者：只有 IO 线程调用 `apply_*` 方法，状态机本身不做内部
/// 同步；切换结果经由上下文的 `ArcSwap` 槽位对外发布。
#[derive(Debug, Clone)]
pub struct GearLadder {
    /// 当前绝对挡位
    position: GearPosition,

    /// 拨杆路径最近一次接受的计数器
    last_lever_counter: Option<u8>,

    /// 手柄路径最近一次接受的计数器
    last_request_counter: Option<u8>,
}

impl GearLadder {
    /// 创建状态机，初始挡位 `Unknown`
    pub fn new() -> Self {
        Self {
            position: GearPosition::Unknown,
            last_lever_counter: None,
            last_request_counter: None,
        }
    }

    /// 当前挡位
    pub fn position(&self) -> GearPosition {
        self.position
    }

    /// 处理一次拨杆事件（总线路径）
    ///
    /// 计数器与上一次接受的事件相同时按重复丢弃；否则先记录计数器
    /// （截断事件也会推进计数器，后续同计数器的周期重发仍被去重），
    /// 再按驻车按钮 / 拨动方向推导新挡位。
    pub fn apply_toggle(&mut self, event: &ToggleEvent) -> GearOutcome {
        if self.last_lever_counter == Some(event.counter) {
            return GearOutcome::Duplicate;
        }
        self.last_lever_counter = Some(event.counter);

        let next = if event.park_button {
            GearPosition::Park
        } else {
            match event.direction {
                ToggleDirection::Up => ladder_up(self.position),
                ToggleDirection::Down => ladder_down(self.position),
            }
        };

        self.commit(next)
    }

    /// 处理一次手柄绝对请求
    ///
    /// 绕过梯级直接设置目标挡位；`Unknown` 不是合法目标，按截断
    /// 处理。手动挡目标越界时收拢到 1..=8。
    pub fn apply_request(&mut self, request: &GearRequest) -> GearOutcome {
        if self.last_request_counter == Some(request.counter) {
            return GearOutcome::Duplicate;
        }
        self.last_request_counter = Some(request.counter);

        let next = match request.target {
            GearPosition::Unknown => return GearOutcome::Clamped,
            GearPosition::Manual(n) => GearPosition::Manual(n.clamp(1, MANUAL_GEAR_MAX)),
            other => other,
        };

        self.commit(next)
    }

    fn commit(&mut self, next: GearPosition) -> GearOutcome {
        if next == self.position {
            return GearOutcome::Clamped;
        }
        self.position = next;
        GearOutcome::Shifted(next)
    }
}

impl Default for GearLadder {
    fn default() -> Self {
        Self::new()
    }
}
