use rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::time::Instant;
use wfpad::{
    Extent, Extractor, Message, PadState, Padder, Role, SessionTracker, Strategy, TriggerAction,
    TriggerEvent, Unit,
};

type SimPadder = Padder<Xoshiro256StarStar>;

/// Run a client padder until it goes idle, feeding every frame it writes to
/// a server padder. Returns the client's frames and what the server
/// delivered.
fn run(
    client: &mut SimPadder,
    server: &mut SimPadder,
    start: Instant,
    mut events: Vec<TriggerEvent>,
) -> (Vec<Message>, Vec<u8>) {
    let mut now = start;
    let mut tick: Option<Instant> = None;
    let mut frames = vec![];
    let mut delivered = vec![];

    for _ in 0..100_000 {
        let actions: Vec<TriggerAction> = client
            .trigger_events(&events, now)
            .unwrap()
            .cloned()
            .collect();
        events.clear();

        for a in actions {
            match a {
                TriggerAction::Send(msgs) => {
                    let mut bytes = vec![];
                    for m in &msgs {
                        m.encode_into(&mut bytes);
                    }
                    frames.extend(msgs);
                    for r in server
                        .trigger_events(&[TriggerEvent::Downstream(bytes)], now)
                        .unwrap()
                    {
                        if let TriggerAction::Deliver(d) = r {
                            delivered.extend_from_slice(d);
                        }
                    }
                }
                TriggerAction::ScheduleTick { timeout } => tick = Some(now + timeout),
                TriggerAction::CancelTick => tick = None,
                _ => {}
            }
        }

        match tick.take() {
            Some(t) => {
                now = t;
                events.push(TriggerEvent::TickExpired);
            }
            None => break,
        }
    }
    (frames, delivered)
}

fn padders(extent: Extent, psize: usize) -> (SimPadder, SimPadder, Instant) {
    let now = Instant::now();
    let s = Strategy::constant_rate(0.01, psize, extent, Unit::Messages).unwrap();
    let client = Padder::new(
        Role::Client,
        s.clone(),
        now,
        Xoshiro256StarStar::seed_from_u64(1),
    )
    .unwrap();
    let server = Padder::new(Role::Server, s, now, Xoshiro256StarStar::seed_from_u64(2)).unwrap();
    (client, server, now)
}

#[test]
fn constant_size_frames_carry_data_intact() {
    let (mut client, mut server, now) = padders(Extent::Batch { size: 16 }, 512);
    let mut tracker = SessionTracker::new();

    let data: Vec<u8> = (0..5000u32).map(|i| (i % 253) as u8).collect();
    let mut events = vec![tracker.on_connect(1).unwrap(), TriggerEvent::Upstream(data.clone())];
    events.push(tracker.on_disconnect(1).unwrap());

    let (frames, delivered) = run(&mut client, &mut server, now, events);
    assert_eq!(delivered, data);
    assert_eq!(client.state(), PadState::Idle);

    // every shaped frame has the same size on the wire
    let shaped: Vec<&Message> = frames.iter().filter(|m| !m.is_control()).collect();
    assert!(shaped.len() >= 10);
    assert!(shaped.iter().all(|m| m.wire_len() == 512));

    // the server followed the session through the app hints
    assert_ne!(server.state(), PadState::Visiting);
}

#[test]
fn total_padding_reaches_power_of_two() {
    let (mut client, mut server, now) = padders(Extent::Total, 1448);
    let session = wfpad::SessionId::from_raw(1);
    let events = vec![
        TriggerEvent::SessionStarts { session },
        TriggerEvent::Upstream(vec![1; 1443 * 5]),
        TriggerEvent::SessionEnds { session },
    ];
    let (frames, delivered) = run(&mut client, &mut server, now, events);
    assert_eq!(delivered.len(), 1443 * 5);
    // 2 hints, 5 data frames, then padding up to 8
    assert_eq!(frames.len(), 8);
    assert_eq!(frames.iter().filter(|m| m.is_padding()).count(), 1);
}

#[test]
fn bytes_survive_arbitrary_chunking() {
    let (mut client, _, now) = padders(Extent::Never, 300);
    let data = vec![42u8; 2000];
    let actions: Vec<TriggerAction> = client
        .trigger_events(&[TriggerEvent::Upstream(data.clone())], now)
        .unwrap()
        .cloned()
        .collect();
    let mut wire = vec![];
    for a in &actions {
        if let TriggerAction::Send(msgs) = a {
            for m in msgs {
                m.encode_into(&mut wire);
            }
        }
    }

    for split in [1, 13, 299, 300, 301, 1448, 4000] {
        let mut e = Extractor::new();
        let mut payload = vec![];
        for chunk in wire.chunks(split) {
            for m in e.extract(chunk).unwrap() {
                payload.extend_from_slice(m.payload());
            }
        }
        assert_eq!(payload, data);
    }
}
