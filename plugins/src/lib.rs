pub mod amqp;
pub mod factory;
