pub mod board;
pub mod color;
pub mod message;
pub mod webhook;
