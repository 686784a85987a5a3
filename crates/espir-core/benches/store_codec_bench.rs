//! Criterion benchmarks for the catalog persistence codec.
//!
//! Every catalog mutation re-encodes the whole catalog and every boot decodes
//! it, so both directions sit on the request path.  Measures a small, a
//! typical, and a full 4 KiB region.
//!
//! Run with:
//! ```bash
//! cargo bench --package espir-core --bench store_codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use espir_core::domain::limits::DEFAULT_STORE_SIZE;
use espir_core::{decode_catalog, encode_catalog, CommandEntry, DeviceProfile, IrCode, IrProtocol};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// `devices` devices with `commands` decoded NEC commands each.
fn build_catalog(devices: usize, commands: usize) -> Vec<DeviceProfile> {
    (0..devices)
        .map(|d| {
            let mut device = DeviceProfile::new(format!("device-{d}"), "television")
                .with_manufacturer("Acme")
                .with_model("X1");
            device.commands = (0..commands)
                .map(|c| {
                    CommandEntry::new(
                        format!("cmd-{c}"),
                        "",
                        IrCode::decoded(IrProtocol::Nec, 0x20DF_0000 + c as u64, 32),
                    )
                })
                .collect();
            device
        })
        .collect()
}

/// One device holding a single long raw capture.
fn build_raw_catalog() -> Vec<DeviceProfile> {
    let mut device = DeviceProfile::new("AC", "climate");
    device.commands.push(CommandEntry::new(
        "Cool 22",
        "captured",
        IrCode::raw((0..512).map(|i| 400 + (i % 7) as u16 * 100).collect()),
    ));
    vec![device]
}

fn fixtures() -> Vec<(&'static str, Vec<DeviceProfile>)> {
    vec![
        ("1x1", build_catalog(1, 1)),
        ("5x10", build_catalog(5, 10)),
        ("raw512", build_raw_catalog()),
    ]
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_catalog");
    for (name, devices) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &devices, |b, devices| {
            b.iter(|| encode_catalog(black_box(devices), DEFAULT_STORE_SIZE))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_catalog");
    for (name, devices) in fixtures() {
        let mut region = encode_catalog(&devices, DEFAULT_STORE_SIZE)
            .expect("fixture must fit the default region");
        region.resize(DEFAULT_STORE_SIZE, 0xFF);
        group.bench_with_input(BenchmarkId::from_parameter(name), &region, |b, region| {
            b.iter(|| decode_catalog(black_box(region)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
