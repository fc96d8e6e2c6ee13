pub mod auth;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod queues;

pub mod background;
pub mod utils;
