//! Benchmarks for deadline arming and stream writes.
//!
//! Measures the cost of consulting a [`DeadlineTimer`] on every I/O call and
//! the throughput of loopback stream writes with and without compression.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polyconn::{CompressType, Connection, DeadlineTimer, StreamConnection};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

/// Benchmark arming a deadline on every call
fn bench_deadline_arm(c: &mut Criterion) {
    let mut group = c.benchmark_group("deadline_arm");

    group.bench_function("unset", |b| {
        let timer = DeadlineTimer::new();
        b.iter(|| black_box(timer.arm(Instant::now())));
    });

    group.bench_function("amortized", |b| {
        let timer = DeadlineTimer::new();
        timer.set(Duration::from_secs(5));
        b.iter(|| black_box(timer.arm(Instant::now())));
    });

    group.finish();
}

async fn connected_pair() -> (StreamConnection, StreamConnection) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (
        StreamConnection::new(client.unwrap()),
        StreamConnection::new(accepted.unwrap().0),
    )
}

/// Benchmark loopback stream writes for each codec
fn bench_stream_write(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("stream_write");
    let payload = b"benchmark payload ".repeat(228);
    group.throughput(Throughput::Bytes(payload.len() as u64));

    for compress in [None, Some(CompressType::BestSpeed), Some(CompressType::Snappy)] {
        let label = compress.map_or("raw".to_string(), |c| c.to_string());
        let (mut client, mut server) = rt.block_on(connected_pair());
        if let Some(compress) = compress {
            client.set_compress_type(compress).unwrap();
            server.set_compress_type(compress).unwrap();
        }
        client.set_write_deadline(Duration::from_secs(5));

        // Drain the server side so the socket buffers never fill up.
        rt.spawn(async move {
            let mut buffer = vec![0u8; 64 * 1024];
            while matches!(server.read(&mut buffer).await, Ok(n) if n > 0) {}
        });

        group.bench_with_input(BenchmarkId::from_parameter(label), &payload, |b, payload| {
            b.to_async(&rt)
                .iter(|| async { client.write(payload.clone()).await.unwrap() });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_deadline_arm, bench_stream_write);
criterion_main!(benches);
