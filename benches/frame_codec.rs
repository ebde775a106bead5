//! Frame codec benchmark suite.
//!
//! Measures the per-frame cost of the hot path:
//! - Decode and encode of a full 4096-byte frame
//! - Command dispatch against the standard table
//! - One request/response round trip through a session
//!
//! Run with: cargo bench --bench frame_codec
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Runtime;
use tokio::sync::Mutex;
use uuid::Uuid;

use vmm_serial::protocol::FRAME_SIZE;
use vmm_serial::{
    Command, Dispatcher, Frame, HostConfig, Session, SessionOptions, SessionRegistry,
};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_SIZES: &[usize] = &[0, 64, 1024, 4031];

// ============================================================================
// Helpers
// ============================================================================

fn query(command: Command) -> Frame {
    let mut frame = Frame::request(Uuid::nil(), command.id(), 0);
    frame.header.need_response = 1;
    frame
}

// ============================================================================
// Benchmark: Codec
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for &size in PAYLOAD_SIZES {
        let request = query(Command::GuestInfo);
        let frame = request
            .response(vec![b'x'; size])
            .expect("payload fits");
        let bytes = frame.encode().expect("encode");

        group.bench_with_input(BenchmarkId::new("encode", size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode()));
        });

        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(Frame::decode(bytes)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Dispatch
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = Dispatcher::standard(Arc::new(HostConfig::default()));
    let mut group = c.benchmark_group("dispatch");

    for command in [Command::GuestUuid, Command::HostVersion, Command::GuestCpuInfo] {
        group.bench_function(command.label(), |b| {
            b.iter(|| black_box(dispatcher.dispatch(command.id())));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Session Round Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let (guest, host) = tokio::io::duplex(FRAME_SIZE * 4);
    let guest = Arc::new(Mutex::new(guest));
    let registry = Arc::new(SessionRegistry::new());
    let dispatcher = Arc::new(Dispatcher::standard(Arc::new(HostConfig::default())));
    rt.block_on(async {
        let _ = Session::spawn(host, "bench", dispatcher, registry, SessionOptions::new());
    });

    let request = query(Command::GuestSerial).encode().expect("encode");

    c.bench_function("round_trip", |b| {
        b.to_async(&rt).iter(|| {
            let request = request.clone();
            let guest = Arc::clone(&guest);
            async move {
                let mut guest = guest.lock().await;
                guest.write_all(&request).await.expect("write");
                let mut buf = vec![0u8; FRAME_SIZE];
                guest.read_exact(&mut buf).await.expect("read");
                black_box(buf)
            }
        });
    });
}

criterion_group!(benches, bench_codec, bench_dispatch, bench_round_trip);
criterion_main!(benches);
