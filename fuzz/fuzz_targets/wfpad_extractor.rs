use wfpad::Extractor;

fn main() {
    afl::fuzz!(|data: &[u8]| {
        if data.is_empty() {
            return;
        }
        // the first byte picks the read size
        let chunk = data[0] as usize + 1;
        let data = &data[1..];

        let mut e = Extractor::new();
        let mut frames = vec![];
        for c in data.chunks(chunk) {
            match e.extract(c) {
                Ok(m) => frames.extend(m),
                Err(_) => return,
            }
        }

        // everything decoded re-encodes to the bytes it came from
        let mut bytes = vec![];
        for f in &frames {
            f.encode_into(&mut bytes);
        }
        assert_eq!(bytes.len() + e.pending(), data.len());
        assert_eq!(&data[..bytes.len()], &bytes[..]);
    });
}
