//! Criterion benchmarks for the Unity messaging binary codec.
//!
//! Heartbeats are encoded every few hundred milliseconds and every inbound
//! datagram is decoded on the client's single event loop, so both directions
//! need to stay in the low-microsecond range even for near-ceiling frames.
//!
//! Run with:
//! ```bash
//! cargo bench --package unity-messaging-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use unity_messaging_core::protocol::codec::{decode_message, encode_message};
use unity_messaging_core::protocol::messages::{Message, MessageType, UDP_BUFFER_CEILING};
use unity_messaging_core::TestMode;

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_ping() -> Message {
    Message::new(MessageType::Ping, "")
}

fn make_execute_tests() -> Message {
    Message::new(
        MessageType::ExecuteTests,
        TestMode::EditMode.with_name("Game.Tests.Inventory.StacksMergeWhenSameItem"),
    )
}

fn make_log_relay() -> Message {
    Message::new(
        MessageType::Warning,
        "Assets/Scripts/Player.cs(42,13): warning CS0168: The variable 'e' is declared but never used",
    )
}

fn make_near_ceiling() -> Message {
    Message::new(
        MessageType::TestListRetrieved,
        "t".repeat(UDP_BUFFER_CEILING - 16),
    )
}

fn fixtures() -> Vec<(&'static str, Message)> {
    vec![
        ("ping", make_ping()),
        ("execute_tests", make_execute_tests()),
        ("log_relay", make_log_relay()),
        ("near_ceiling", make_near_ceiling()),
    ]
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for (name, msg) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &msg, |b, msg| {
            b.iter(|| encode_message(black_box(msg)).unwrap());
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (name, msg) in fixtures() {
        let bytes = encode_message(&msg).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| decode_message(black_box(bytes)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
