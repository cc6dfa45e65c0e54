pub mod broadcast;
pub mod handler;
pub mod server;
