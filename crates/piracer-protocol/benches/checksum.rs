//! 校验和与编解码热路径基准测试
//!
//! 拨杆帧以固定周期到达，每帧都要重算一次 CRC-8；这里量化单次
//! 校验、单帧验证解码和速度编解码的开销，作为回归基线。

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use piracer_protocol::{
    ToggleDirection, VelocityReading, compute_checksum, decode_velocity, encode_lever_frame,
    encode_velocity, ids, verify_and_decode_lever_frame,
};

fn bench_compute_checksum(c: &mut Criterion) {
    let content = [0x01u8, 0x00, 0x00, 0x00, 0x00, 0x00];
    c.bench_function("compute_checksum/lever", |b| {
        b.iter(|| {
            compute_checksum(
                black_box(ids::LEVER_FRAME_ID),
                black_box(&content),
                black_box(9),
            )
        })
    });
}

fn bench_lever_verify_decode(c: &mut Criterion) {
    let frame = encode_lever_frame(ToggleDirection::Up, false, 9);
    c.bench_function("verify_and_decode_lever_frame", |b| {
        b.iter(|| verify_and_decode_lever_frame(black_box(&frame)))
    });
}

fn bench_velocity_codec(c: &mut Criterion) {
    let reading = VelocityReading::from_kmh(23.45, 0);
    let frame = encode_velocity(&reading);

    c.bench_function("encode_velocity", |b| {
        b.iter(|| encode_velocity(black_box(&reading)))
    });
    c.bench_function("decode_velocity", |b| {
        b.iter(|| decode_velocity(black_box(&frame)))
    });
}

criterion_group!(
    benches,
    bench_compute_checksum,
    bench_lever_verify_decode,
    bench_velocity_codec
);
criterion_main!(benches);
