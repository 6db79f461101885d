use async_trait::async_trait;

use crate::error::BusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Routing key matched against binding patterns (`*` one word, `#` zero or more).
    Topic,
    /// Every bound queue receives every message; routing key ignored.
    Fanout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

impl ExchangeSpec {
    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExchangeKind::Topic,
            durable: true,
        }
    }

    pub fn fanout(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExchangeKind::Fanout,
            durable: true,
        }
    }
}

/// A queue plus the single binding a consumer needs.
///
/// `queue: None` asks the broker for a server-named queue; combined with
/// `exclusive` this gives every subscriber its own copy of the exchange's
/// traffic that disappears with the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue: Option<String>,
    pub durable: bool,
    pub exclusive: bool,
    pub exchange: String,
    pub routing_key: String,
}

impl QueueBinding {
    pub fn durable(queue: impl Into<String>, exchange: &str, routing_key: &str) -> Self {
        Self {
            queue: Some(queue.into()),
            durable: true,
            exclusive: false,
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        }
    }

    pub fn exclusive(exchange: &str) -> Self {
        Self {
            queue: None,
            durable: false,
            exclusive: true,
            exchange: exchange.to_string(),
            routing_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

impl OutgoingMessage {
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, BusError> {
        Ok(Self {
            body: serde_json::to_vec(value)?,
            content_type: "application/json",
        })
    }
}

/// Transport-specific acknowledgement handle.
#[async_trait]
pub trait DeliveryAck: Send {
    async fn ack(self: Box<Self>) -> Result<(), BusError>;
}

pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
    acker: Option<Box<dyn DeliveryAck>>,
}

impl Delivery {
    pub fn new(routing_key: String, body: Vec<u8>, acker: Option<Box<dyn DeliveryAck>>) -> Self {
        Self {
            routing_key,
            body,
            acker,
        }
    }

    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Acknowledge consumption. Idempotent; a second call is a no-op.
    pub async fn ack(&mut self) -> Result<(), BusError> {
        match self.acker.take() {
            Some(acker) => acker.ack().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("bytes", &self.body.len())
            .field("acked", &self.acker.is_none())
            .finish()
    }
}
