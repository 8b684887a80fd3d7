//! wfpad is a traffic-shaping layer for pluggable transports that defends
//! against website fingerprinting.
//!
//! An observer of an encrypted connection can often tell which website a
//! user visits from the sizes and timing of the packets alone. wfpad puts a
//! framing protocol between the application and the wire so that frames can
//! be padded and padding frames injected, and runs a [`Padder`] that decides,
//! for a given [`Strategy`], when to send what.
//!
//! The crate performs no I/O. Bottom-up, start with [`histo`] (sampling
//! delays and sizes), [`message`] and [`extractor`] (the frame codec),
//! [`control`] (control messages) and [`mathutil`], before [`strategy`] and
//! finally [`Padder`]. The `wfpad-transport` crate runs a padder over an
//! async connection, and `wfpad-strategies` builds strategies for known
//! countermeasures.
//!
//! ## Example usage
//! ```
//! use std::time::{Duration, Instant};
//! use wfpad::{Extent, Padder, Role, SessionId, Strategy, TriggerAction, TriggerEvent, Unit};
//!
//! // one 1448-byte frame every 10 ms, padded to a power of two frames
//! let strategy = Strategy::constant_rate(0.01, 1448, Extent::Total, Unit::Messages).unwrap();
//! let mut padder = Padder::new(Role::Client, strategy, Instant::now(), rand::rng()).unwrap();
//!
//! let session = SessionId::from_raw(1);
//! let events = [
//!     TriggerEvent::SessionStarts { session },
//!     TriggerEvent::Upstream(b"GET / HTTP/1.1\r\n\r\n".to_vec()),
//! ];
//! for action in padder.trigger_events(&events, Instant::now()).unwrap() {
//!     match action {
//!         TriggerAction::Send(frames) => {
//!             // write every frame, in order, to the connection
//!             for frame in frames {
//!                 let _bytes = frame.encode();
//!             }
//!         }
//!         TriggerAction::ScheduleTick { timeout } => {
//!             // trigger TriggerEvent::TickExpired after the timeout
//!             assert_eq!(*timeout, Duration::from_millis(10));
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod constants;
pub mod control;
pub mod error;
pub mod extractor;
pub mod histo;
pub mod mathutil;
pub mod message;
pub mod padder;
pub mod session;
pub mod shim;
pub mod strategy;
pub mod time;

pub use crate::control::{ControlAssembler, ControlMessage, Opcode, build_control};
pub use crate::error::Error;
pub use crate::extractor::Extractor;
pub use crate::histo::{Histogram, Label};
pub use crate::message::{Flags, Message, decode};
pub use crate::padder::{PadState, Padder, Role, TriggerAction, TriggerEvent};
pub use crate::session::{Direction, Session, SessionId};
pub use crate::shim::SessionTracker;
pub use crate::strategy::{Extent, Strategy, Unit};
