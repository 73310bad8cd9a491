//! Benchmarks for DNS message decoding.
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::net::Ipv4Addr;

use waypoint::dns::builder::MessageBuilder;
use waypoint::dns::{Message, TYPE_A, decode_name};

fn create_reply(answers: u8, compress: bool) -> Vec<u8> {
    let mut builder = MessageBuilder::response(0x1234)
        .compress(compress)
        .question("video-edge.eu1.game.example.com", TYPE_A);
    for i in 0..answers {
        builder = builder.answer_a(
            "video-edge.eu1.game.example.com",
            Ipv4Addr::new(10, 0, 0, i),
            300,
        );
    }
    builder.build()
}

fn bench_decode_query(c: &mut Criterion) {
    let query = MessageBuilder::query(0x1234)
        .question("example.com", TYPE_A)
        .build();

    c.bench_function("decode_query", |b| {
        b.iter(|| Message::decode(black_box(&query)))
    });
}

fn bench_decode_reply(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_reply");

    for answers in [1u8, 8, 32] {
        for compress in [false, true] {
            let reply = create_reply(answers, compress);
            let label = if compress { "compressed" } else { "plain" };
            group.throughput(Throughput::Bytes(reply.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(label, answers),
                &reply,
                |b, reply| b.iter(|| Message::decode(black_box(reply))),
            );
        }
    }

    group.finish();
}

fn bench_decode_name_pointer(c: &mut Criterion) {
    let reply = create_reply(1, true);
    // First answer name is a pointer straight after the question.
    let offset = 12 + "video-edge.eu1.game.example.com".len() + 2 + 4;

    c.bench_function("decode_name_pointer", |b| {
        b.iter(|| decode_name(black_box(&reply), black_box(offset)))
    });
}

fn bench_reject_truncated(c: &mut Criterion) {
    let reply = create_reply(8, true);
    let truncated = &reply[..reply.len() - 1];

    c.bench_function("decode_truncated", |b| {
        b.iter(|| Message::decode(black_box(truncated)))
    });
}

criterion_group!(
    benches,
    bench_decode_query,
    bench_decode_reply,
    bench_decode_name_pointer,
    bench_reject_truncated,
);

criterion_main!(benches);
