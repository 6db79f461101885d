mod connector;

pub use connector::AmqpConnector;
