pub mod config;
pub mod engine;
pub mod events;
pub mod game_queue;
pub mod http;
pub mod mapper;
pub mod renderer;
pub mod session;
pub mod stats;
pub mod strategy;
pub mod stream;
pub mod surface;
pub mod terminal;
