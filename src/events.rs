//! Host event queue.
//!
//! The BLE host delivers its callbacks on its own task.  Those callbacks
//! never touch component state: they translate raw stack events into
//! [`HostEvent`] values and push them here.  The main loop is the single
//! consumer and the only writer of `ImprovService` and `AdvertisementRelay`.
//!
//! ```text
//! ┌──────────────┐  try_send   ┌────────────────┐  drain  ┌──────────────┐
//! │ BLE host     │────────────▶│ HostEventQueue │────────▶│  Main Loop   │
//! │ callbacks    │  (no block) │ (bounded, 32)  │         │  (consumer)  │
//! └──────────────┘             └────────────────┘         └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::ports::ConnHandle;
use crate::improv::Characteristic;
use crate::improv::codec::MAX_COMMAND_LEN;
use crate::relay::ScanReport;

/// Maximum number of pending host events.
pub const HOST_EVENT_QUEUE_CAP: usize = 32;

/// Payload of a characteristic write.  Longer writes are truncated.
pub type WriteData = heapless::Vec<u8, MAX_COMMAND_LEN>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Host stack synchronised; GAP/GATT calls may be made.
    Synced,
    /// Host stack reset; scanning and advertising are gone.
    Reset { reason: i32 },
    Connected { conn: ConnHandle },
    /// A connection attempt failed; advertising stopped.
    ConnectFailed { status: i32 },
    Disconnected { conn: ConnHandle, reason: i32 },
    AdvertisingComplete,
    /// The host could not start a requested scan.
    ScanFailed { status: i32 },
    Write { characteristic: Characteristic, data: WriteData },
    ScanResult(ScanReport),
}

/// Bounded MPSC hand-off from the host task to the main loop.
pub struct HostEventQueue {
    channel: Channel<CriticalSectionRawMutex, HostEvent, HOST_EVENT_QUEUE_CAP>,
    dropped: AtomicU32,
}

impl Default for HostEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Never blocks.  Returns `false` if the queue was full and the event
    /// was dropped.
    pub fn push(&self, event: HostEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Host event queue full, event dropped ({} total)", n);
                false
            }
        }
    }

    pub fn pop(&self) -> Option<HostEvent> {
        self.channel.try_receive().ok()
    }

    /// Hand every pending event to `f`, oldest first.
    pub fn drain(&self, mut f: impl FnMut(HostEvent)) -> usize {
        let mut n = 0;
        while let Some(event) = self.pop() {
            f(event);
            n += 1;
        }
        n
    }

    /// Events dropped since boot because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}
