//! An async driver for [`wfpad`] padders.
//!
//! [`run`] owns one shaped connection. It feeds application data, bytes read
//! from the peer, session hints and timer expiries into a [`Padder`], and
//! carries out the actions the padder returns. Frames are only ever written
//! from the task running [`run`], in the order the padder produced them.

use rand_core::RngCore;
use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use wfpad::{Message, PadState, Padder, TriggerAction, TriggerEvent};

const READ_BUF_LEN: usize = 16 * 1024;
/// Reading from the peer pauses while this many deliveries wait for the
/// application.
const MAX_PENDING_DELIVERIES: usize = 64;
/// Padding requests beyond this many outstanding ones are dropped.
const MAX_PENDING_PADDING: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Io(#[from] io::Error),
    #[error("padding protocol violated: {0}")]
    Padding(#[from] wfpad::Error),
}

/// Deadlines armed by the padder.
#[derive(Debug, Default)]
struct Timers {
    tick: Option<Instant>,
    padding: Vec<(Instant, u32)>,
}

impl Timers {
    /// Arm a padding deadline. Returns false if too many are outstanding.
    fn schedule_padding(&mut self, at: Instant, count: u32) -> bool {
        if self.padding.len() >= MAX_PENDING_PADDING {
            return false;
        }
        self.padding.push((at, count));
        true
    }

    fn next_padding(&self) -> Option<Instant> {
        self.padding.iter().map(|(at, _)| *at).min()
    }

    /// Remove the padding requests due at `now`, returning their total
    /// count.
    fn take_due_padding(&mut self, now: Instant) -> u32 {
        let mut count = 0u32;
        self.padding.retain(|(at, c)| {
            if *at <= now {
                count = count.saturating_add(*c);
                false
            } else {
                true
            }
        });
        count
    }
}

/// Shape the connection `stream` with `padder` until it closes.
///
/// - Data received on `upstream_rx` is sent to the peer as the padder
///   decides.
/// - Application data received from the peer goes to `downstream_tx`. A
///   slow receiver does not delay shaping; reads from the peer stop instead
///   once enough data is waiting.
/// - `hints_rx` carries [`TriggerEvent::SessionStarts`] and
///   [`TriggerEvent::SessionEnds`], e.g., from a
///   [`SessionTracker`](wfpad::SessionTracker). Other events on it are
///   ignored.
///
/// Returns `Ok` when the peer closes the connection, or when both
/// `upstream_rx` and `hints_rx` are closed and the padder is idle, in which
/// case the write side of `stream` is shut down first. I/O failures and
/// protocol violations by the peer end the task with an error. In all cases
/// the padder is reset and every timer is dropped.
pub async fn run<S, R>(
    stream: S,
    mut padder: Padder<R>,
    mut upstream_rx: mpsc::Receiver<Vec<u8>>,
    downstream_tx: mpsc::Sender<Vec<u8>>,
    mut hints_rx: mpsc::Receiver<TriggerEvent>,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite,
    R: RngCore,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = vec![0; READ_BUF_LEN];
    let mut timers = Timers::default();
    let mut upstream_open = true;
    let mut hints_open = true;
    let mut deliveries: VecDeque<Vec<u8>> = VecDeque::new();
    let mut downstream_open = true;

    loop {
        if !upstream_open && !hints_open && padder.state() == PadState::Idle {
            log::debug!("application done, closing connection");
            flush_deliveries(&downstream_tx, &mut deliveries, downstream_open).await;
            writer.shutdown().await?;
            return Ok(());
        }

        let tick = timers.tick;
        let next_padding = timers.next_padding();
        let reading = deliveries.len() < MAX_PENDING_DELIVERIES;
        let delivering = downstream_open && !deliveries.is_empty();
        let event = tokio::select! {
            permit = downstream_tx.reserve(), if delivering => {
                match permit {
                    Ok(permit) => {
                        if let Some(data) = deliveries.pop_front() {
                            permit.send(data);
                        }
                    }
                    Err(_) => {
                        log::debug!("application stopped receiving, dropping data");
                        deliveries.clear();
                        downstream_open = false;
                    }
                }
                continue;
            }
            read = reader.read(&mut buf), if reading => match read {
                Ok(0) => {
                    log::debug!("peer closed the connection");
                    lose_connection(&mut padder);
                    flush_deliveries(&downstream_tx, &mut deliveries, downstream_open).await;
                    return Ok(());
                }
                Ok(n) => TriggerEvent::Downstream(buf[..n].to_vec()),
                Err(e) => {
                    log::warn!("read failed: {e}");
                    lose_connection(&mut padder);
                    return Err(e.into());
                }
            },
            data = upstream_rx.recv(), if upstream_open => match data {
                Some(data) => TriggerEvent::Upstream(data),
                None => {
                    upstream_open = false;
                    continue;
                }
            },
            hint = hints_rx.recv(), if hints_open => match hint {
                Some(
                    e @ (TriggerEvent::SessionStarts { .. } | TriggerEvent::SessionEnds { .. }),
                ) => e,
                Some(e) => {
                    log::warn!("ignoring {e:?} on the hint channel");
                    continue;
                }
                None => {
                    hints_open = false;
                    continue;
                }
            },
            () = sleep_until(tick.unwrap_or_else(Instant::now)), if tick.is_some() => {
                timers.tick = None;
                TriggerEvent::TickExpired
            }
            () = sleep_until(next_padding.unwrap_or_else(Instant::now)),
                if next_padding.is_some() =>
            {
                TriggerEvent::PaddingDue {
                    count: timers.take_due_padding(Instant::now()),
                }
            }
        };

        let now = Instant::now();
        // on error the padder has already reset itself
        let actions: Vec<TriggerAction> = padder
            .trigger_events(&[event], now.into_std())?
            .cloned()
            .collect();

        for action in actions {
            match action {
                TriggerAction::Send(frames) => {
                    let len = frames.iter().map(Message::wire_len).sum();
                    let mut bytes = Vec::with_capacity(len);
                    for frame in &frames {
                        frame.encode_into(&mut bytes);
                    }
                    if let Err(e) = write_frames(&mut writer, &bytes).await {
                        log::warn!("write failed: {e}");
                        lose_connection(&mut padder);
                        return Err(e.into());
                    }
                }
                TriggerAction::Deliver(data) => {
                    if downstream_open {
                        deliveries.push_back(data);
                    }
                }
                TriggerAction::ScheduleTick { timeout } => timers.tick = Some(now + timeout),
                TriggerAction::CancelTick => timers.tick = None,
                TriggerAction::SchedulePadding { timeout, count } => {
                    if !timers.schedule_padding(now + timeout, count) {
                        log::warn!("too many padding requests pending, dropping one");
                    }
                }
            }
        }
    }
}

/// Hand the remaining deliveries to the application before the task ends.
async fn flush_deliveries(
    tx: &mpsc::Sender<Vec<u8>>,
    deliveries: &mut VecDeque<Vec<u8>>,
    open: bool,
) {
    if !open {
        return;
    }
    for data in deliveries.drain(..) {
        if tx.send(data).await.is_err() {
            log::debug!("application stopped receiving, dropping data");
            break;
        }
    }
}

async fn write_frames<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}

fn lose_connection<R: RngCore>(padder: &mut Padder<R>) {
    let result = padder
        .trigger_events(&[TriggerEvent::ConnectionLost], Instant::now().into_std())
        .map(|_| ());
    if let Err(e) = result {
        log::warn!("failed to reset padder: {e}");
    }
}
