//! The padding state machine of one shaped connection.

use rand_core::RngCore;
use std::fmt;

use crate::constants::{HDR_LEN, MAX_PADDING_REQUEST, MAX_SAMPLED_DELAY, MPU, MTU};
use crate::control::{ControlAssembler, ControlMessage};
use crate::extractor::Extractor;
use crate::histo::Histogram;
use crate::message::Message;
use crate::session::{Direction, Session, SessionId};
use crate::strategy::{Extent, Strategy};
use crate::time::{Duration as _, Instant};
use crate::Error;

/// Which end of the connection a padder runs on. Only the client learns
/// about browsing sessions first hand and relays them to the server with
/// APP_HINT control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

/// The state of a padder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadState {
    /// Data passes through framed but unshaped.
    Idle,
    /// A session is active: all outgoing frames are shaped.
    Visiting,
    /// The session ended and padding continues until the stop condition
    /// holds.
    PaddingAfterVisit,
}

impl fmt::Display for PadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An event to be triggered in the padder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// A browsing session started.
    SessionStarts { session: SessionId },
    /// A browsing session ended.
    SessionEnds { session: SessionId },
    /// Application data to send to the peer.
    Upstream(Vec<u8>),
    /// Bytes read from the connection, in any chunking.
    Downstream(Vec<u8>),
    /// The timer of the last [`TriggerAction::ScheduleTick`] fired.
    TickExpired,
    /// The timeout of a [`TriggerAction::SchedulePadding`] expired.
    PaddingDue { count: u32 },
    /// The connection failed or was closed by the peer.
    ConnectionLost,
}

/// An action the padder asks its caller to carry out, in order.
#[derive(PartialEq, Debug, Clone)]
pub enum TriggerAction<T: Instant = std::time::Instant> {
    /// Write the frames to the connection.
    Send(Vec<Message>),
    /// Hand data received from the peer to the application.
    Deliver(Vec<u8>),
    /// Arm the padding timer, replacing any previous one, to trigger
    /// [`TriggerEvent::TickExpired`] after the timeout.
    ScheduleTick { timeout: T::Duration },
    /// Disarm the padding timer.
    CancelTick,
    /// Trigger [`TriggerEvent::PaddingDue`] with `count` after the timeout.
    /// Independent of the padding timer.
    SchedulePadding { timeout: T::Duration, count: u32 },
}

/// A padder shapes the traffic of one connection according to a
/// [`Strategy`].
///
/// Like the rest of wfpad it performs no I/O: it repeatedly takes
/// [`TriggerEvent`]s as input and produces [`TriggerAction`]s for its caller
/// to carry out. See [`Padder::trigger_events`].
#[derive(Debug, Clone)]
pub struct Padder<R, T = std::time::Instant>
where
    T: Instant,
{
    role: Role,
    strategy: Strategy,
    state: PadState,
    session: Session,
    // session-scoped copies, replaceable by control messages
    burst: Histogram,
    gap: Histogram,
    length: Histogram,
    extent: Extent,
    target: Option<u64>,
    send_buf: Vec<u8>,
    tick_pending: bool,
    padding_start: T,
    current_time: T,
    rng: R,
    extractor: Extractor,
    assembler: ControlAssembler,
    actions: Vec<TriggerAction<T>>,
}

impl<R, T> Padder<R, T>
where
    R: RngCore,
    T: Instant,
{
    /// Create a padder for `strategy`, validating it. The padder starts
    /// [`PadState::Idle`].
    pub fn new(role: Role, strategy: Strategy, current_time: T, rng: R) -> Result<Self, Error> {
        strategy.validate()?;
        Ok(Self {
            role,
            burst: strategy.burst.clone(),
            gap: strategy.gap.clone(),
            length: strategy.length.clone(),
            extent: strategy.extent,
            strategy,
            state: PadState::Idle,
            session: Session::default(),
            target: None,
            send_buf: vec![],
            tick_pending: false,
            padding_start: current_time,
            current_time,
            rng,
            extractor: Extractor::new(),
            assembler: ControlAssembler::new(),
            actions: vec![],
        })
    }

    /// Trigger zero or more events in the padder and return the resulting
    /// actions, which must be carried out in order.
    ///
    /// An error means the peer violated the protocol: the padder is reset to
    /// [`PadState::Idle`] and the connection must be closed.
    pub fn trigger_events(
        &mut self,
        events: &[TriggerEvent],
        current_time: T,
    ) -> Result<impl Iterator<Item = &TriggerAction<T>>, Error> {
        self.actions.clear();
        self.current_time = current_time;
        for e in events {
            if let Err(err) = self.process_event(e) {
                log::warn!("padder failed on {:?}: {err}", e);
                self.connection_lost();
                return Err(err);
            }
        }
        Ok(self.actions.iter())
    }

    pub fn state(&self) -> PadState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Statistics of the current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Bytes of application data waiting for a shaped frame.
    pub fn buffered(&self) -> usize {
        self.send_buf.len()
    }

    fn process_event(&mut self, e: &TriggerEvent) -> Result<(), Error> {
        match e {
            TriggerEvent::SessionStarts { session } => self.start_session(Some(*session)),
            TriggerEvent::SessionEnds { session } => self.end_session(*session),
            TriggerEvent::Upstream(data) => self.upstream(data),
            TriggerEvent::Downstream(bytes) => self.downstream(bytes),
            TriggerEvent::TickExpired => self.tick(),
            TriggerEvent::PaddingDue { count } => self.send_padding(*count),
            TriggerEvent::ConnectionLost => {
                self.connection_lost();
                Ok(())
            }
        }
    }

    fn start_session(&mut self, id: Option<SessionId>) -> Result<(), Error> {
        if self.state == PadState::Visiting {
            log::debug!("ignoring start of {id:?}, already visiting");
            return Ok(());
        }
        log::debug!("{} -> Visiting ({id:?})", self.state);

        self.session = Session::new(id);
        self.session.set_visiting(true);
        self.burst = self.strategy.burst.clone();
        self.gap = self.strategy.gap.clone();
        self.length = self.strategy.length.clone();
        self.extent = self.strategy.extent;
        self.target = None;
        self.padding_start = self.current_time;
        self.state = PadState::Visiting;

        if let (Role::Client, Some(session)) = (self.role, id) {
            self.send_control(&ControlMessage::AppHint {
                session,
                visiting: true,
            })?;
        }
        if !self.tick_pending {
            let delay = self.gap.sample(&mut self.rng);
            self.schedule_tick(delay);
        }
        Ok(())
    }

    fn end_session(&mut self, id: SessionId) -> Result<(), Error> {
        if self.state != PadState::Visiting {
            log::debug!("ignoring end of {id} in state {}", self.state);
            return Ok(());
        }
        if self.session.id().is_some_and(|active| active != id) {
            log::warn!("ignoring end of {id}, not the active session");
            return Ok(());
        }
        log::debug!("Visiting -> PaddingAfterVisit ({id})");

        self.session.set_visiting(false);
        self.state = PadState::PaddingAfterVisit;
        if self.role == Role::Client {
            self.send_control(&ControlMessage::AppHint {
                session: id,
                visiting: false,
            })?;
        }
        if self.maybe_stop()? {
            return Ok(());
        }
        if !self.tick_pending {
            let delay = self.gap.sample(&mut self.rng);
            self.schedule_tick(delay);
        }
        Ok(())
    }

    fn upstream(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        if self.state == PadState::Idle {
            let frames = data
                .chunks(MPU)
                .map(|chunk| Message::data(chunk.to_vec(), 0))
                .collect::<Result<Vec<_>, _>>()?;
            self.send(frames);
            return Ok(());
        }

        self.send_buf.extend_from_slice(data);
        if self.state == PadState::PaddingAfterVisit {
            // the target must cover data sent after the visit too
            self.target = None;
        }
        if !self.tick_pending {
            let delay = self.burst.sample(&mut self.rng);
            // buffered data must not wait for a padding run to restart
            self.schedule_tick(if delay.is_infinite() { 0.0 } else { delay });
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<(), Error> {
        self.tick_pending = false;
        if self.state == PadState::Idle {
            return Ok(());
        }

        let body = self.sample_frame_len() - HDR_LEN;
        let carries_data = !self.send_buf.is_empty();
        let msg = if carries_data {
            let n = body.min(self.send_buf.len());
            let payload: Vec<u8> = self.send_buf.drain(..n).collect();
            Message::data(payload, body - n)?
        } else {
            Message::padding(body)?
        };
        self.send(vec![msg]);

        if self.maybe_stop()? {
            return Ok(());
        }
        let delay = if carries_data {
            self.burst.sample(&mut self.rng)
        } else {
            self.gap.sample(&mut self.rng)
        };
        if delay.is_infinite() && !self.send_buf.is_empty() {
            self.schedule_tick(0.0);
        } else {
            self.schedule_tick(delay);
        }
        Ok(())
    }

    fn downstream(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for msg in self.extractor.extract(bytes)? {
            self.session.record(Direction::Received, &msg);
            if msg.is_data() && !msg.payload().is_empty() {
                self.actions.push(TriggerAction::Deliver(msg.payload().to_vec()));
            }
            if let Some((opcode, args)) = self.assembler.push(&msg)? {
                let control = ControlMessage::from_parts(opcode, &args)?;
                self.handle_control(control)?;
            }
        }
        Ok(())
    }

    fn handle_control(&mut self, control: ControlMessage) -> Result<(), Error> {
        log::debug!("received control {control} in state {}", self.state);
        match control {
            ControlMessage::Start => self.start_session(None)?,
            ControlMessage::Stop => self.stop_padding()?,
            ControlMessage::Ignore => self.send_padding(1)?,
            ControlMessage::SendPadding { count, delay_ms } => {
                if count > MAX_PADDING_REQUEST {
                    return Err(Error::ControlArgs(format!(
                        "request for {count} padding frames exceeds {MAX_PADDING_REQUEST}"
                    )));
                }
                self.actions.push(TriggerAction::SchedulePadding {
                    timeout: T::Duration::from_secs_f64(millis_to_secs(delay_ms)),
                    count,
                });
            }
            ControlMessage::AppHint { session, visiting } => {
                if self.role == Role::Client {
                    log::warn!("client ignoring app hint for {session}");
                } else if visiting {
                    self.start_session(Some(session))?;
                } else {
                    self.end_session(session)?;
                }
            }
            ControlMessage::BurstHistogram(h) => self.burst = h,
            ControlMessage::GapHistogram(h) => self.gap = h,
            ControlMessage::InjectHistogram(_) => {
                log::debug!("inject histograms are not supported, ignoring");
            }
            ControlMessage::TotalPad { delay_ms, .. } => {
                self.set_extent(Extent::Total, delay_ms)?;
            }
            ControlMessage::PayloadPad { delay_ms, .. } => {
                self.set_extent(Extent::Payload, delay_ms)?;
            }
            ControlMessage::BatchPad {
                batch, delay_ms, ..
            } => {
                self.set_extent(Extent::Batch { size: batch }, delay_ms)?;
            }
        }
        Ok(())
    }

    /// Switch to constant-rate padding with a new extent for the rest of
    /// the session.
    fn set_extent(&mut self, extent: Extent, delay_ms: u64) -> Result<(), Error> {
        extent.validate()?;
        let period = millis_to_secs(delay_ms);
        self.burst = Histogram::uniform(period)?;
        self.gap = Histogram::uniform(period)?;
        self.extent = extent;
        self.target = None;
        Ok(())
    }

    fn send_padding(&mut self, count: u32) -> Result<(), Error> {
        if count > MAX_PADDING_REQUEST {
            log::warn!("capping {count} padding frames to {MAX_PADDING_REQUEST}");
        }
        let frames = (0..count.min(MAX_PADDING_REQUEST))
            .map(|_| Message::padding(self.sample_frame_len() - HDR_LEN))
            .collect::<Result<Vec<_>, _>>()?;
        if !frames.is_empty() {
            self.send(frames);
        }
        Ok(())
    }

    fn send_control(&mut self, control: &ControlMessage) -> Result<(), Error> {
        let frames = control.to_messages()?;
        self.send(frames);
        Ok(())
    }

    fn send(&mut self, frames: Vec<Message>) {
        for f in &frames {
            log::trace!("sending {f}");
            self.session.record(Direction::Sent, f);
        }
        self.actions.push(TriggerAction::Send(frames));
    }

    /// Stop padding, flushing any buffered data unshaped.
    fn stop_padding(&mut self) -> Result<(), Error> {
        if !self.send_buf.is_empty() {
            let data = std::mem::take(&mut self.send_buf);
            self.state = PadState::Idle;
            self.upstream(&data)?;
        }
        self.to_idle();
        Ok(())
    }

    /// Stop if the stop condition holds and no data is waiting. Returns true
    /// if padding stopped. The padding target is fixed by the first check
    /// after the visit ended and all data went out.
    fn maybe_stop(&mut self) -> Result<bool, Error> {
        if !self.send_buf.is_empty() {
            return Ok(false);
        }
        if self.state == PadState::PaddingAfterVisit && self.target.is_none() {
            self.target = self.extent.target(&self.session, self.strategy.unit)?;
        }
        let elapsed = self
            .current_time
            .saturating_duration_since(self.padding_start)
            .as_secs_f64();
        if !self
            .extent
            .should_stop(&self.session, self.strategy.unit, self.target, elapsed)
        {
            return Ok(false);
        }
        log::debug!(
            "stop condition met after {} frames, {} bytes",
            self.session.messages(Direction::Sent),
            self.session.bytes(Direction::Sent)
        );
        self.to_idle();
        Ok(true)
    }

    fn to_idle(&mut self) {
        if self.state != PadState::Idle {
            log::debug!("{} -> Idle", self.state);
        }
        self.state = PadState::Idle;
        if self.tick_pending {
            self.tick_pending = false;
            self.actions.push(TriggerAction::CancelTick);
        }
        self.session.reset();
        self.target = None;
    }

    fn connection_lost(&mut self) {
        self.send_buf.clear();
        self.extractor = Extractor::new();
        self.assembler = ControlAssembler::new();
        self.to_idle();
    }

    /// Arm the padding timer. An infinite delay ends the padding run.
    fn schedule_tick(&mut self, delay: f64) {
        if delay.is_infinite() {
            log::trace!("padding run ended");
            return;
        }
        let timeout = T::Duration::from_secs_f64(delay.clamp(0.0, MAX_SAMPLED_DELAY));
        self.actions.push(TriggerAction::ScheduleTick { timeout });
        self.tick_pending = true;
    }

    /// The wire size of the next shaped frame.
    fn sample_frame_len(&mut self) -> usize {
        let len = self.length.sample(&mut self.rng);
        if !len.is_finite() || len >= MTU as f64 {
            return MTU;
        }
        (len.round() as usize).clamp(HDR_LEN + 1, MTU)
    }
}

fn millis_to_secs(ms: u64) -> f64 {
    (ms as f64 / 1000.0).min(MAX_SAMPLED_DELAY)
}
