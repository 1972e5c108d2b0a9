//! Benchmarks for streamed reply decoding
//!
//! This benchmark measures:
//! - per-line classification (structured parse vs. salvage)
//! - end-to-end decoding of a chunked body into the final text

use ai_chat_client::pipeline::decode::LineDecoder;
use ai_chat_client::pipeline::{salvage_text, StreamDecoder};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::time::Duration;

const FRAMES: &[&str] = &[
    r#"data: {"text":"Once"}"#,
    r#"data: {"text":" upon"}"#,
    r#"data: {"text":" a time"}"#,
    ": keepalive",
    r#"data: {"text":", there was","success":true}"#,
    "data: [DONE]",
];

const BROKEN_FRAME: &str = r#"data: {"text":"salvage \"me\" please","complete":tr"#;

fn body(repeat: usize) -> String {
    let mut out = String::new();
    for _ in 0..repeat {
        for frame in &FRAMES[..4] {
            out.push_str(frame);
            out.push('\n');
        }
    }
    out.push_str("data: [DONE]\n");
    out
}

fn bench_line_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_classification");
    let decoder = LineDecoder::new();

    let frame = FRAMES[1];
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("structured_frame", |b| {
        b.iter(|| decoder.decode_line(black_box(frame)))
    });

    group.throughput(Throughput::Bytes(BROKEN_FRAME.len() as u64));
    group.bench_function("salvaged_frame", |b| {
        b.iter(|| decoder.decode_line(black_box(BROKEN_FRAME)))
    });

    group.bench_function("salvage_text_only", |b| {
        b.iter(|| salvage_text(black_box(BROKEN_FRAME)))
    });

    group.finish();
}

fn bench_stream_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_decode");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let decoder = StreamDecoder::new(Duration::from_secs(60));

    for repeat in [10usize, 200] {
        let payload = body(repeat);
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_function(format!("chunked_{}_events", repeat * 3), |b| {
            b.to_async(&rt).iter(|| {
                // 64-byte chunks so lines regularly straddle chunk boundaries
                let chunks: Vec<ai_chat_client::Result<Bytes>> = payload
                    .as_bytes()
                    .chunks(64)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                let decoder = decoder.clone();
                async move {
                    let text = decoder
                        .decode(Box::pin(futures::stream::iter(chunks)), None)
                        .await
                        .unwrap();
                    black_box(text)
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_line_classification, bench_stream_decode);
criterion_main!(benches);
