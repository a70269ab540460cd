//! Benchmarks for the inbound hot path
//!
//! Measures the work the session pump and the foreground do per received
//! chunk:
//! - Frame reassembly and packet decoding across receive-sized chunks
//! - Store ingestion of a decoded batch, including the aging pass
//!
//! Platform: Cross-platform (synthetic streams, CI-safe)

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use rearview::protocol::{FrameDecoder, Packet};
use rearview::test_utils::{encoded_stream, float_channel_registration, mixed_registration};
use rearview::types::{Value, Vector3};
use rearview::{ClientConfig, DataStore};
use std::hint::black_box;

const SAMPLES: usize = 10_000;

/// Registration plus `SAMPLES` data packets cycling over the mixed channels.
fn mixed_stream() -> Vec<Packet> {
    let mut packets = vec![mixed_registration()];
    packets.extend((0..SAMPLES).map(|i| {
        let time = i as f64 * 0.001;
        match i % 3 {
            0 => Packet::sample(0, time, Value::Int((i % 6) as i32)),
            1 => Packet::sample(1, time, Value::Float(i as f32 * 0.5)),
            _ => Packet::sample(2, time, Value::Vector(Vector3::new(i as f32, 0.0, 1.0))),
        }
    }));
    packets
}

fn bench_frame_decoding(c: &mut Criterion) {
    let bytes = encoded_stream(&mixed_stream()).expect("encode stream");
    let max_frame_len = ClientConfig::default().max_frame_len;

    let mut group = c.benchmark_group("frame_decoding");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    for chunk in [64usize, 1024, 16 * 1024] {
        group.bench_function(format!("chunk_{chunk}"), |b| {
            b.iter(|| {
                let mut decoder = FrameDecoder::new(max_frame_len);
                let mut count = 0;
                for piece in bytes.chunks(chunk) {
                    count += decoder.push(black_box(piece)).expect("valid stream").len();
                }
                black_box(count)
            })
        });
    }

    group.finish();
}

fn bench_store_ingest(c: &mut Criterion) {
    let config = ClientConfig::default();
    let packets = mixed_stream();

    let mut group = c.benchmark_group("store_ingest");
    group.throughput(Throughput::Elements(packets.len() as u64));

    group.bench_function("mixed_batch", |b| {
        b.iter_batched(
            || packets.clone(),
            |batch| {
                let mut store = DataStore::new(&config);
                store.ingest_batch(batch).expect("valid stream");
                black_box(store.latest_time())
            },
            BatchSize::LargeInput,
        )
    });

    // Long single-channel run so aging passes trigger repeatedly.
    let mut long_run = vec![float_channel_registration("temp")];
    long_run.extend((0..SAMPLES).map(|i| Packet::sample(0, i as f64 * 0.01, Value::Float(1.0))));

    group.bench_function("aging_per_packet", |b| {
        b.iter_batched(
            || long_run.clone(),
            |batch| {
                let mut store = DataStore::new(&config);
                for packet in batch {
                    store.ingest(packet).expect("valid stream");
                    store.maintain();
                }
                black_box(store.series(0).map(|s| s.len()))
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_frame_decoding, bench_store_ingest);
criterion_main!(benches);
