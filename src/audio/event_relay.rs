//! Event relay - render-to-control beat notifications
//!
//! A bounded SPSC ring carries [BeatEvent]s off the render thread:
//! - Producer side (render thread): wait-free push; when the ring is
//!   momentarily full the new event is dropped. Beat delivery is
//!   latest-value, not a queue with backpressure.
//! - Consumer side (pump thread): drains to the most recent event every few
//!   milliseconds and forwards it to a tokio broadcast channel that UI
//!   layers subscribe to.
//!
//! The pump exits on its own once the producer is dropped (stream closed).

use rtrb::{Consumer, Producer, RingBuffer};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::model::BeatEvent;

/// Ring capacity. At the supported ceiling of 600 BPM a beat fires every
/// 100ms, so even a stalled pump has seconds of slack before events drop.
pub const EVENT_RELAY_CAPACITY: usize = 64;

/// How often the pump drains the ring.
const PUMP_POLL: Duration = Duration::from_millis(4);

/// Create a connected relay pair.
pub fn beat_event_channel() -> (BeatEventSender, BeatEventReceiver) {
    let (producer, consumer) = RingBuffer::new(EVENT_RELAY_CAPACITY);
    (
        BeatEventSender { producer },
        BeatEventReceiver { consumer },
    )
}

/// Render-thread half of the relay.
pub struct BeatEventSender {
    producer: Producer<BeatEvent>,
}

impl BeatEventSender {
    /// Push an event without waiting. Returns false if the ring was full
    /// and the event was dropped.
    #[inline]
    pub fn send(&mut self, event: BeatEvent) -> bool {
        self.producer.push(event).is_ok()
    }

    /// True once the receiving side (the pump) is gone.
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Pump-side half of the relay.
pub struct BeatEventReceiver {
    consumer: Consumer<BeatEvent>,
}

impl BeatEventReceiver {
    /// Drain everything queued and return the most recent event, if any.
    pub fn latest(&mut self) -> Option<BeatEvent> {
        let mut latest = None;
        while let Ok(event) = self.consumer.pop() {
            latest = Some(event);
        }
        latest
    }

    /// Pop a single event in FIFO order.
    pub fn pop(&mut self) -> Option<BeatEvent> {
        self.consumer.pop().ok()
    }

    /// True once the producing side (the render state) is gone.
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

/// Spawn the thread that bridges the relay to the broadcast channel.
///
/// Subscribers come and go; a send with no receivers is not an error. The
/// thread drains before checking for abandonment so events pushed just
/// before stream teardown still get delivered.
pub fn spawn_beat_pump(
    mut receiver: BeatEventReceiver,
    beats_tx: broadcast::Sender<BeatEvent>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        log::debug!("[EventRelay] Beat pump started");
        loop {
            match receiver.latest() {
                Some(event) => {
                    let _ = beats_tx.send(event);
                }
                None => {
                    if receiver.is_abandoned() {
                        break;
                    }
                }
            }
            std::thread::sleep(PUMP_POLL);
        }
        log::debug!("[EventRelay] Beat pump exited");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(beat_index: u32) -> BeatEvent {
        BeatEvent {
            beat_index,
            generation: 0,
        }
    }

    #[test]
    fn test_latest_drains_to_most_recent() {
        let (mut tx, mut rx) = beat_event_channel();

        assert!(tx.send(event(0)));
        assert!(tx.send(event(1)));
        assert!(tx.send(event(2)));

        assert_eq!(rx.latest(), Some(event(2)), "latest() keeps only the newest");
        assert_eq!(rx.latest(), None, "ring is empty after draining");
    }

    #[test]
    fn test_full_ring_drops_newest() {
        let (mut tx, mut rx) = beat_event_channel();

        for i in 0..EVENT_RELAY_CAPACITY as u32 {
            assert!(tx.send(event(i)), "Ring should accept {} events", EVENT_RELAY_CAPACITY);
        }
        assert!(
            !tx.send(event(999)),
            "A full ring drops the incoming event"
        );

        let newest = rx.latest().unwrap();
        assert_eq!(
            newest.beat_index,
            EVENT_RELAY_CAPACITY as u32 - 1,
            "The dropped event must not appear"
        );
    }

    #[test]
    fn test_abandonment_is_visible_on_both_sides() {
        let (tx, mut rx) = beat_event_channel();
        assert!(!rx.is_abandoned());
        drop(tx);
        assert!(rx.is_abandoned());

        let (mut tx, rx) = beat_event_channel();
        drop(rx);
        assert!(tx.is_abandoned());
        // Sends into an abandoned ring still must not block or panic
        tx.send(event(0));
    }

    #[test]
    fn test_events_survive_producer_drop() {
        let (mut tx, mut rx) = beat_event_channel();
        tx.send(event(7));
        drop(tx);

        assert_eq!(rx.latest(), Some(event(7)), "Queued events drain after drop");
        assert!(rx.is_abandoned());
    }

    #[tokio::test]
    async fn test_pump_forwards_to_broadcast_and_exits() {
        let (mut tx, rx) = beat_event_channel();
        let (beats_tx, mut beats_rx) = broadcast::channel(16);
        let pump = spawn_beat_pump(rx, beats_tx);

        tx.send(event(3));
        let received = tokio::time::timeout(Duration::from_secs(1), beats_rx.recv())
            .await
            .expect("pump should forward within the timeout")
            .expect("broadcast should stay open");
        assert_eq!(received, event(3));

        drop(tx);
        pump.join().expect("pump exits when the producer is dropped");
    }
}
