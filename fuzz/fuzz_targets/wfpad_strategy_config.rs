use wfpad_strategies::StaticStrategy;
use wfpad_strategies::config::Config;

fn main() {
    afl::fuzz!(|data: &[u8]| {
        let s = String::from_utf8_lossy(data);
        if let Ok(c) = Config::from_toml(&s) {
            let _ = c.to_strategy();
        }
        if let Ok(s) = s.parse::<StaticStrategy>() {
            let _ = wfpad_strategies::get_strategy(&s);
        }
    });
}
