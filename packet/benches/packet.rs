use std::hint::black_box;
use std::io::{Read, Write};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use packet::{Channel, ConnectionId, Limits, Packet};
use serial::{ByteRead, ByteWrite};

const FIELDS: usize = 64;

fn build(limit: usize) -> Packet {
    let mut packet = Packet::outbound(7, limit);
    for i in 0..FIELDS {
        packet.write_u32(i as u32).unwrap();
        packet.write_string("player").unwrap();
    }
    packet
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let size = build(Limits::default().packet_limit()).prepare_to_send().unwrap();
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("fields", |b| {
        b.iter(|| {
            let mut packet = build(black_box(Limits::default().packet_limit()));
            packet.prepare_to_send().unwrap()
        })
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut outbound = build(Limits::default().packet_limit());
    outbound.prepare_to_send().unwrap();
    let frame = outbound.as_bytes().to_vec();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("fields", |b| {
        b.iter(|| {
            let mut packet =
                Packet::received(ConnectionId::new(0), frame.len(), black_box(&frame)).unwrap();
            let mut total = 0u64;
            for _ in 0..FIELDS {
                total += u64::from(packet.read_u32());
                total += packet.read_string().len() as u64;
            }
            total
        })
    });
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let limits = Limits::default();
    let mut group = c.benchmark_group("stream");
    group.bench_function("send_receive", |b| {
        b.iter(|| {
            let mut sender = Channel::new(ConnectionId::new(0), limits.clone());
            sender.send_packet(build(limits.packet_limit())).unwrap();
            let mut wire: Vec<u8> = Vec::new();
            sender.send_packets(Write::write, &mut wire).unwrap();

            let mut receiver = Channel::new(ConnectionId::new(1), limits.clone());
            let mut source: &[u8] = &wire;
            receiver
                .receive_packet(Read::read, &mut source)
                .unwrap()
                .map(|packet| packet.size())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_stream);
criterion_main!(benches);
