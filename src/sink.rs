//! Fire-and-forget boundary toward live visualization.
//!
//! The numeric pipeline never waits on rendering: `emit` takes a snapshot,
//! returns nothing, and must not block. A renderer that falls behind or a
//! disconnected consumer costs nothing but a dropped frame.

use std::sync::mpsc::{channel, Receiver, Sender};

use crate::types::Trace;

/// One update's velocity trace, ready for display
#[derive(Debug, Clone)]
pub struct VelocityFrame {
    /// 0-indexed update count within the scan
    pub update: usize,
    /// Time axis in microseconds
    pub times_us: Trace,
    /// Velocity in m/s
    pub velocity: Trace,
}

/// Destination for per-update velocity frames
pub trait TraceSink: Send + Sync {
    /// Hand a frame to the consumer. Must not block and must not fail the
    /// caller; delivery is best-effort.
    fn emit(&self, frame: VelocityFrame);
}

/// Sink that discards every frame
#[derive(Debug, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn emit(&self, _frame: VelocityFrame) {}
}

/// Sink backed by an unbounded channel.
///
/// The send never blocks; once the receiving side hangs up, frames are
/// silently dropped.
pub struct ChannelSink {
    tx: Sender<VelocityFrame>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<VelocityFrame>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }
}

impl TraceSink for ChannelSink {
    fn emit(&self, frame: VelocityFrame) {
        if self.tx.send(frame).is_err() {
            log::debug!("velocity frame dropped: no visualization consumer attached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn frame() -> VelocityFrame {
        VelocityFrame {
            update: 0,
            times_us: Array1::zeros(4),
            velocity: Array1::zeros(4),
        }
    }

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, rx) = ChannelSink::new();
        sink.emit(frame());
        let received = rx.try_recv().unwrap();
        assert_eq!(received.velocity.len(), 4);
    }

    #[test]
    fn test_emit_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(frame());
    }
}
