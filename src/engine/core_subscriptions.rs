use futures::Stream;
use tokio::runtime::Builder;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::model::{BeatEvent, EngineEvent};

use super::MetronomeEngine;

impl MetronomeEngine {
    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Subscribe to beat onsets directly on the broadcast channel.
    ///
    /// Delivery is latest-value: a lagging receiver loses the oldest events,
    /// never the newest.
    pub fn subscribe_beats(&self) -> broadcast::Receiver<BeatEvent> {
        self.beats_tx.subscribe()
    }

    /// Subscribe to engine lifecycle/telemetry events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Beat onsets bridged to an unbounded channel for consumers without a
    /// Tokio runtime of their own (the FFI listener thread uses this).
    pub fn beats_unbounded(&self) -> mpsc::UnboundedReceiver<BeatEvent> {
        Self::bridge(self.beats_tx.subscribe())
    }

    /// Lifecycle events bridged to an unbounded channel.
    pub fn events_unbounded(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        Self::bridge(self.events_tx.subscribe())
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub fn beats_stream(&self) -> impl Stream<Item = BeatEvent> + Unpin {
        UnboundedReceiverStream::new(self.beats_unbounded())
    }

    pub fn events_stream(&self) -> impl Stream<Item = EngineEvent> + Unpin {
        UnboundedReceiverStream::new(self.events_unbounded())
    }

    /// Milliseconds since the engine was initialized (telemetry timestamps
    /// count up from the same epoch).
    pub fn uptime_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    // Dedicated bridge thread with its own current-thread runtime: callers
    // may not have a Tokio runtime available (JNI threads do not). Exits
    // when the broadcast sender closes or the receiver is dropped.
    fn bridge<T: Clone + Send + 'static>(
        mut broadcast_rx: broadcast::Receiver<T>,
    ) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            let rt = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime");
            rt.block_on(async move {
                loop {
                    match broadcast_rx.recv().await {
                        Ok(item) => {
                            if tx.send(item).is_err() {
                                break;
                            }
                        }
                        // Lagged: skip to the newest items.
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        });

        rx
    }
}
