//! 车辆驱动端到端集成测试
//!
//! 使用 MockCanAdapter 模拟总线输入，验证从帧注入到状态快照、
//! LED 回执以及协作式关停的完整流程。

use std::time::{Duration, Instant};

use piracer_can::{MockCanAdapter, MockCanHandle};
use piracer_driver::{
    EdgeEvent, EstimatorConfig, Piracer, PiracerConfig, monotonic_micros,
};
use piracer_protocol::{
    GearPosition, PiracerFrame, ToggleDirection, VelocityReading, decode_led_frame,
    encode_lever_frame, encode_velocity, ids,
};

fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !predicate() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn lever_up(counter: u8) -> PiracerFrame {
    encode_lever_frame(ToggleDirection::Up, false, counter)
}

fn lever_down(counter: u8) -> PiracerFrame {
    encode_lever_frame(ToggleDirection::Down, false, counter)
}

fn keepalive() -> PiracerFrame {
    PiracerFrame::new_standard(ids::KEEPALIVE_FRAME_ID as u16, &[0u8; 8])
}

fn spawn_piracer(config: Option<PiracerConfig>) -> (Piracer, MockCanHandle) {
    let adapter = MockCanAdapter::new();
    let handle = adapter.handle();
    (Piracer::new(adapter, config), handle)
}

/// 端到端：拨杆三连 UP 从空挡推到 M3，并观察 LED 回执
#[test]
fn test_lever_ladder_end_to_end() {
    let (piracer, bus) = spawn_piracer(None);
    let ctx = piracer.context();

    // 初次 UP：未知挡按空挡处理，落在前进挡
    bus.queue_frame(lever_up(0));
    wait_until("shift to DRIVE", || {
        ctx.gear.load().position == GearPosition::Drive
    });

    bus.queue_frame(lever_up(1));
    bus.queue_frame(lever_up(2));
    wait_until("shift to M3", || {
        ctx.gear.load().position == GearPosition::Manual(3)
    });

    let metrics = piracer.get_metrics();
    assert_eq!(metrics.gear_transitions, 3);
    assert_eq!(metrics.checksum_errors, 0);

    // 最后一帧 LED 回执必须反映手动挡
    let led_frames: Vec<_> = bus
        .take_sent_frames()
        .into_iter()
        .filter(|f| f.id == ids::LED_FRAME_ID)
        .collect();
    assert!(!led_frames.is_empty());
    let (code, _) = decode_led_frame(led_frames.last().unwrap()).unwrap();
    assert_eq!(code as u8, 0x81);
}

/// 拨杆与手柄两条输入源交替操作，计数器互不干扰
#[test]
fn test_mixed_lever_and_gamepad_sources() {
    let (piracer, bus) = spawn_piracer(None);
    let ctx = piracer.context();
    let requester = piracer.gear_requester();

    bus.queue_frame(lever_up(0));
    wait_until("lever to DRIVE", || {
        ctx.gear.load().position == GearPosition::Drive
    });

    requester.request(GearPosition::Neutral).unwrap();
    wait_until("request to NEUTRAL", || {
        ctx.gear.load().position == GearPosition::Neutral
    });

    // 拨杆计数器继续自己的序列，不受手柄请求影响
    bus.queue_frame(lever_down(1));
    wait_until("lever to REVERSE", || {
        ctx.gear.load().position == GearPosition::Reverse
    });

    let metrics = piracer.get_metrics();
    assert_eq!(metrics.gear_transitions, 3);
    assert_eq!(metrics.duplicate_events, 0);
}

/// 坏帧与重传帧都不产生额外换挡
#[test]
fn test_corruption_and_retransmission_are_filtered() {
    let (piracer, bus) = spawn_piracer(None);
    let ctx = piracer.context();

    bus.queue_frame(lever_up(5));
    wait_until("first shift", || {
        ctx.gear.load().position == GearPosition::Drive
    });

    // 同一计数器重传两次：按来源去重，不再换挡
    bus.queue_frame(lever_up(5));
    bus.queue_frame(lever_up(5));
    wait_until("duplicates counted", || {
        piracer.get_metrics().duplicate_events == 2
    });

    // 篡改一位载荷使校验和失配：静默丢弃
    let mut corrupt = lever_up(6);
    corrupt.data[0] ^= 0x10;
    bus.queue_frame(corrupt);
    wait_until("checksum error counted", || {
        piracer.get_metrics().checksum_errors == 1
    });

    assert_eq!(ctx.gear.load().position, GearPosition::Drive);
    assert_eq!(piracer.get_metrics().gear_transitions, 1);
}

/// 速度帧与保活帧都会刷新连接监控
#[test]
fn test_velocity_and_keepalive_feed_connection() {
    let (piracer, bus) = spawn_piracer(None);
    assert!(!piracer.is_connected());

    let reading = VelocityReading {
        kmh_centi: 1234,
        timestamp_us: 0,
    };
    bus.queue_frame(encode_velocity(&reading));
    piracer.wait_for_feedback(Duration::from_secs(2)).unwrap();
    assert!(piracer.is_connected());

    let ctx = piracer.context();
    wait_until("velocity published", || {
        ctx.velocity.load().kmh_centi == 1234
    });
    // IO 线程用单调时钟补打时间戳
    assert!(ctx.velocity.load().timestamp_us > 0);

    bus.queue_frame(keepalive());
    wait_until("keepalive counted", || {
        piracer.get_metrics().rx_frames_valid >= 2
    });
    assert!(piracer.connection_age().is_some());
}

/// 霍尔边沿经估计线程转成速度估计，停止供给后回落到静止
#[test]
fn test_edge_events_to_velocity_and_back_to_standstill() {
    let config = PiracerConfig {
        estimator: EstimatorConfig {
            recompute_interval: Duration::from_millis(50),
            ..EstimatorConfig::default()
        },
        ..PiracerConfig::default()
    };
    let (piracer, _bus) = spawn_piracer(Some(config));
    let edges = piracer.edge_sender();
    let ctx = piracer.context();

    let base = monotonic_micros();
    for i in 0..20u64 {
        edges
            .send(EdgeEvent {
                timestamp_us: base + i * 10_000,
            })
            .unwrap();
    }

    wait_until("velocity estimate", || ctx.velocity.load().kmh_centi > 0);
    // 后续窗口没有新边沿，估计值必须精确归零
    wait_until("back to standstill", || {
        ctx.velocity.load().kmh_centi == 0
    });
    assert_eq!(piracer.get_metrics().edge_events_total, 20);
}

/// 队列里还压着帧也能在限时内干净关停
#[test]
fn test_shutdown_under_load() {
    let (piracer, bus) = spawn_piracer(None);
    for i in 0..16u8 {
        bus.queue_frame(lever_up(i % 16));
        bus.queue_frame(keepalive());
    }

    let start = Instant::now();
    drop(piracer);
    assert!(start.elapsed() < Duration::from_secs(1));
}
