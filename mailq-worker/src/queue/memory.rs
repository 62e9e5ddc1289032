//! In-process queue used by tests in place of RabbitMQ.
//!
//! Mirrors the broker behaviour the worker relies on: deliveries carry fresh
//! tags, a requeued message goes back to the front of its queue with
//! `redelivered` set, and acked or discarded messages are gone.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::Poll;

use async_trait::async_trait;
use futures::Stream;

use super::delivery::{Delivery, Disposition, Settle};
use super::error::BrokerError;
use super::producer::Publish;

struct Message {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct State {
    connected: bool,
    queues: HashMap<String, VecDeque<Message>>,
    in_flight: HashMap<u64, (String, Vec<u8>)>,
    settled: Vec<(u64, Disposition)>,
    next_tag: u64,
}

#[derive(Clone)]
pub(crate) struct MemoryQueue {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                connected: true,
                ..Default::default()
            })),
        }
    }
}

impl MemoryQueue {
    /// Make every further broker operation fail with [`BrokerError::Closed`].
    pub fn disconnect(&self) {
        self.state.lock().unwrap().connected = false;
    }

    /// Push a raw payload, bypassing the producer.
    pub fn push_raw(&self, queue: &str, payload: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.queues.entry(queue.to_string()).or_default().push_back(Message {
            payload: payload.to_vec(),
            redelivered: false,
        });
    }

    /// Payloads waiting in `queue`, front first.
    pub fn queued(&self, queue: &str) -> Vec<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .queues
            .get(queue)
            .map(|q| q.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Dispositions received so far, in order.
    pub fn settled(&self) -> Vec<(u64, Disposition)> {
        self.state.lock().unwrap().settled.clone()
    }

    /// Deliveries handed out but not yet settled.
    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight.len()
    }

    /// Stream deliveries from `queue` until it is empty.
    pub fn subscribe(&self, queue: &str) -> impl Stream<Item = Result<Delivery, BrokerError>> + Unpin {
        let queue = queue.to_string();
        let this = self.clone();

        futures::stream::poll_fn(move |_cx| {
            let mut state = this.state.lock().unwrap();
            if !state.connected {
                return Poll::Ready(None);
            }

            let Some(message) = state.queues.get_mut(&queue).and_then(|q| q.pop_front()) else {
                return Poll::Ready(None);
            };

            state.next_tag += 1;
            let tag = state.next_tag;
            state
                .in_flight
                .insert(tag, (queue.clone(), message.payload.clone()));

            let settler = MemorySettler {
                state: Arc::clone(&this.state),
            };

            Poll::Ready(Some(Ok(Delivery::new(
                tag,
                message.payload,
                message.redelivered,
                settler,
            ))))
        })
    }
}

#[async_trait]
impl Publish for MemoryQueue {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(BrokerError::Closed);
        }
        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.state.lock().unwrap().connected {
            return Err(BrokerError::Closed);
        }
        self.push_raw(queue, payload);
        Ok(())
    }
}

struct MemorySettler {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Settle for MemorySettler {
    async fn settle(&self, tag: u64, disposition: Disposition) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        let (queue, payload) = state
            .in_flight
            .remove(&tag)
            .unwrap_or_else(|| panic!("delivery {tag} settled twice or never delivered"));

        state.settled.push((tag, disposition));

        if disposition == Disposition::Requeue {
            state.queues.entry(queue).or_default().push_front(Message {
                payload,
                redelivered: true,
            });
        }

        Ok(())
    }
}
