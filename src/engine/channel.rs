//! Bounded single-producer channel between the acquisition thread and the
//! reduction worker. When full, the producer evicts the oldest entry rather
//! than waiting, so a stalled consumer can never hold up the bus.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::HardwareError;
use crate::hal::RawSample;

/// What the acquisition thread hands over
#[derive(Debug, Clone, PartialEq)]
pub enum Acquired {
    Sample(RawSample),
    /// Last item of a run that ended on a bus fault
    Fault(HardwareError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    /// Sent after evicting the oldest buffered entry
    DroppedOldest,
}

/// The receiving side is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

pub fn sample_channel(capacity: usize) -> (SampleSender, SampleReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let closed = Arc::new(AtomicBool::new(false));
    (
        SampleSender {
            tx,
            evict: rx.clone(),
            closed: closed.clone(),
        },
        SampleReceiver { rx, closed },
    )
}

pub struct SampleSender {
    tx: Sender<Acquired>,
    // Producer-side handle used only to evict on overflow
    evict: Receiver<Acquired>,
    closed: Arc<AtomicBool>,
}

impl SampleSender {
    /// Never blocks
    pub fn push(&self, item: Acquired) -> Result<PushOutcome, Disconnected> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Disconnected);
        }

        let mut item = item;
        let mut dropped = false;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => {
                    return Ok(if dropped {
                        PushOutcome::DroppedOldest
                    } else {
                        PushOutcome::Sent
                    });
                }
                Err(TrySendError::Full(rejected)) => {
                    item = rejected;
                    // The consumer may have emptied a slot in the meantime
                    if self.evict.try_recv().is_ok() {
                        dropped = true;
                    }
                }
                Err(TrySendError::Disconnected(_)) => return Err(Disconnected),
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

pub struct SampleReceiver {
    rx: Receiver<Acquired>,
    closed: Arc<AtomicBool>,
}

impl SampleReceiver {
    pub fn try_recv(&self) -> Option<Acquired> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Everything buffered right now, oldest first
    pub fn drain(&self) -> Vec<Acquired> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Drop for SampleReceiver {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}
