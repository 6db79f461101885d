//! In-process broker with AMQP-like exchange semantics.
//!
//! Used by tests and by the single-process `all` mode. Durable named queues
//! outlive connections and buffer messages; server-named exclusive queues are
//! dropped with their subscriber or on [`MemoryBus::disconnect_all`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::BusError;

use super::traits::{BusChannel, BusConnector, Subscription};
use super::types::{Delivery, ExchangeKind, ExchangeSpec, OutgoingMessage, QueueBinding};

#[derive(Debug, Clone)]
struct Envelope {
    routing_key: String,
    body: Vec<u8>,
}

struct Binding {
    queue: Option<String>,
    pattern: String,
    target: mpsc::UnboundedSender<Envelope>,
}

struct Exchange {
    kind: ExchangeKind,
    bindings: Vec<Binding>,
}

struct NamedQueue {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>>,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, NamedQueue>,
}

struct Inner {
    state: Mutex<BrokerState>,
    generation: watch::Sender<u64>,
    available: AtomicBool,
}

#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<Inner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BrokerState::default()),
                generation,
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Drop every open connection: pending subscriptions yield
    /// [`BusError::Disconnected`], exclusive queues are deleted, and stale
    /// channels refuse further operations.
    pub fn disconnect_all(&self) {
        {
            let mut state = self.lock_state();
            for exchange in state.exchanges.values_mut() {
                exchange.bindings.retain(|b| b.queue.is_some());
            }
        }
        self.inner.generation.send_modify(|g| *g += 1);
        tracing::debug!("memory bus: all connections dropped");
    }

    /// While unavailable, `connect` fails with [`BusError::Unreachable`].
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
        if !available {
            self.disconnect_all();
        }
    }

    /// Queues currently bound to an exchange.
    pub fn binding_count(&self, exchange: &str) -> usize {
        let mut state = self.lock_state();
        match state.exchanges.get_mut(exchange) {
            Some(ex) => {
                ex.bindings.retain(|b| !b.target.is_closed());
                ex.bindings.len()
            }
            None => 0,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_generation(&self) -> u64 {
        *self.inner.generation.borrow()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusConnector for MemoryBus {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> Result<Arc<dyn BusChannel>, BusError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(BusError::Unreachable("memory bus is offline".into()));
        }
        Ok(Arc::new(MemoryChannel {
            bus: self.clone(),
            generation: self.current_generation(),
        }))
    }
}

struct MemoryChannel {
    bus: MemoryBus,
    generation: u64,
}

impl MemoryChannel {
    fn ensure_open(&self) -> Result<(), BusError> {
        if self.bus.current_generation() != self.generation {
            return Err(BusError::Disconnected);
        }
        Ok(())
    }
}

#[async_trait]
impl BusChannel for MemoryChannel {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut state = self.bus.lock_state();
        match state.exchanges.get(&spec.name) {
            Some(existing) if existing.kind != spec.kind => Err(BusError::ExchangeKindMismatch {
                name: spec.name.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(
                    spec.name.clone(),
                    Exchange {
                        kind: spec.kind,
                        bindings: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutgoingMessage,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut state = self.bus.lock_state();
        let ex = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| BusError::UnknownExchange(exchange.to_string()))?;

        let kind = ex.kind;
        ex.bindings.retain(|binding| {
            let matches = match kind {
                ExchangeKind::Fanout => true,
                ExchangeKind::Topic => topic_matches(&binding.pattern, routing_key),
            };
            if !matches {
                return !binding.target.is_closed();
            }
            binding
                .target
                .send(Envelope {
                    routing_key: routing_key.to_string(),
                    body: message.body.clone(),
                })
                .is_ok()
        });
        Ok(())
    }

    async fn subscribe(&self, binding: &QueueBinding) -> Result<Box<dyn Subscription>, BusError> {
        self.ensure_open()?;
        let mut state = self.bus.lock_state();
        if !state.exchanges.contains_key(&binding.exchange) {
            return Err(BusError::UnknownExchange(binding.exchange.clone()));
        }

        let (target, rx) = match &binding.queue {
            Some(name) => {
                let queue = state.queues.entry(name.clone()).or_insert_with(|| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    NamedQueue {
                        tx,
                        rx: Arc::new(tokio::sync::Mutex::new(rx)),
                    }
                });
                (queue.tx.clone(), QueueRx::Shared(queue.rx.clone()))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (tx, QueueRx::Owned(rx))
            }
        };

        let exchange = state
            .exchanges
            .get_mut(&binding.exchange)
            .ok_or_else(|| BusError::UnknownExchange(binding.exchange.clone()))?;
        let already_bound = binding.queue.is_some()
            && exchange
                .bindings
                .iter()
                .any(|b| b.queue == binding.queue && b.pattern == binding.routing_key);
        if !already_bound {
            exchange.bindings.push(Binding {
                queue: binding.queue.clone(),
                pattern: binding.routing_key.clone(),
                target,
            });
        }

        Ok(Box::new(MemorySubscription {
            rx,
            generation_rx: self.bus.inner.generation.subscribe(),
            generation: self.generation,
        }))
    }
}

enum QueueRx {
    Owned(mpsc::UnboundedReceiver<Envelope>),
    Shared(Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>>),
}

impl QueueRx {
    async fn recv(&mut self) -> Option<Envelope> {
        match self {
            QueueRx::Owned(rx) => rx.recv().await,
            QueueRx::Shared(rx) => rx.lock().await.recv().await,
        }
    }
}

struct MemorySubscription {
    rx: QueueRx,
    generation_rx: watch::Receiver<u64>,
    generation: u64,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Option<Result<Delivery, BusError>> {
        loop {
            if *self.generation_rx.borrow() != self.generation {
                return Some(Err(BusError::Disconnected));
            }
            tokio::select! {
                biased;
                changed = self.generation_rx.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                envelope = self.rx.recv() => {
                    return envelope.map(|e| Ok(Delivery::new(e.routing_key, e.body, None)));
                }
            }
        }
    }
}

/// AMQP topic matching: words separated by `.`, `*` matches exactly one word,
/// `#` matches zero or more words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = if routing_key.is_empty() {
        Vec::new()
    } else {
        routing_key.split('.').collect()
    };
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&k, key_rest)) if word == "*" || word == k => match_words(rest, key_rest),
            _ => false,
        },
    }
}
