use criterion::{Criterion, criterion_group, criterion_main};
use rand_xoshiro::Xoshiro256StarStar;
use rand_xoshiro::rand_core::SeedableRng;
use std::hint::black_box;
use std::time::{Duration, Instant};
use wfpad::constants::MTU;
use wfpad::{
    ControlMessage, Extent, Extractor, Message, Padder, Role, SessionId, Strategy, TriggerAction,
    TriggerEvent, Unit,
};

/// About 1 MiB of data frames with a control message in between every
/// hundred frames.
fn stream() -> Vec<u8> {
    let mut bytes = vec![];
    for (i, msg) in Message::encapsulate(&vec![0xab; 1 << 20], MTU)
        .iter()
        .enumerate()
    {
        msg.encode_into(&mut bytes);
        if i % 100 == 0 {
            for m in ControlMessage::SendPadding {
                count: 2,
                delay_ms: 10,
            }
            .to_messages()
            .unwrap()
            {
                m.encode_into(&mut bytes);
            }
        }
    }
    bytes
}

pub fn framing_benchmarks(c: &mut Criterion) {
    let bytes = stream();

    c.bench_function("Extractor 1 MiB, one call", |b| {
        b.iter(|| {
            let mut e = Extractor::new();
            e.extract(black_box(&bytes)).unwrap().len()
        })
    });

    c.bench_function("Extractor 1 MiB, 1000 byte reads", |b| {
        b.iter(|| {
            let mut e = Extractor::new();
            let mut n = 0;
            for chunk in bytes.chunks(1000) {
                n += e.extract(black_box(chunk)).unwrap().len();
            }
            n
        })
    });

    c.bench_function("Padder 1000 ticks while visiting", |b| {
        let strategy =
            Strategy::constant_rate(0.01, MTU, Extent::Never, Unit::Messages).unwrap();
        let mut now = Instant::now();
        let mut p = Padder::new(
            Role::Server,
            strategy,
            now,
            Xoshiro256StarStar::seed_from_u64(0),
        )
        .unwrap();
        p.trigger_events(
            &[TriggerEvent::SessionStarts {
                session: SessionId::from_raw(1),
            }],
            now,
        )
        .unwrap()
        .count();
        let data = vec![0; 100_000];

        b.iter(|| {
            let mut sent = 0;
            p.trigger_events(&[TriggerEvent::Upstream(data.clone())], now)
                .unwrap()
                .count();
            for _ in 0..1000 {
                now += Duration::from_millis(10);
                for a in p.trigger_events(&[TriggerEvent::TickExpired], now).unwrap() {
                    if let TriggerAction::Send(frames) = a {
                        sent += frames.len();
                    }
                }
            }
            sent
        })
    });
}

criterion_group!(benches, framing_benchmarks);
criterion_main!(benches);
