use wfpad::{ControlMessage, Opcode};

fn main() {
    afl::fuzz!(|data: &[u8]| {
        // longer arguments may not fit a control message
        if data.is_empty() || data.len() > 32 * 1024 {
            return;
        }
        let Ok(opcode) = Opcode::try_from(data[0]) else {
            return;
        };
        let Ok(msg) = ControlMessage::from_parts(opcode, &data[1..]) else {
            return;
        };
        // anything accepted can be sent again
        let frames = msg.to_messages().unwrap();
        assert!(!frames.is_empty());
        assert_eq!(msg.opcode(), opcode);
    });
}
