use rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::time::{Duration, Instant};
use wfpad::{Extent, Padder, Role, SessionId, Strategy, TriggerEvent, Unit};

fn main() {
    afl::fuzz!(|data: &[u8]| {
        let strategy =
            Strategy::constant_rate(0.01, 512, Extent::Batch { size: 4 }, Unit::Messages).unwrap();
        let mut now = Instant::now();
        let mut p = Padder::new(
            Role::Server,
            strategy,
            now,
            Xoshiro256StarStar::seed_from_u64(0),
        )
        .unwrap();
        let session = SessionId::from_raw(1);

        // each byte is an event, except for peer bytes that take the rest
        for (i, b) in data.iter().enumerate() {
            let event = match b % 6 {
                0 => TriggerEvent::SessionStarts { session },
                1 => TriggerEvent::SessionEnds { session },
                2 => TriggerEvent::Upstream(vec![*b; *b as usize * 10]),
                3 => TriggerEvent::TickExpired,
                4 => TriggerEvent::PaddingDue {
                    count: u32::from(*b % 8),
                },
                _ => TriggerEvent::Downstream(data[i + 1..].to_vec()),
            };
            now += Duration::from_millis(10);
            if p.trigger_events(&[event], now).is_err() {
                return;
            }
        }
    });
}
