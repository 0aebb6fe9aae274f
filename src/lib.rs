pub mod config;
pub mod constants;
pub mod crowd;
pub mod engine;
pub mod entity_store;
pub mod error;
pub mod events;
pub mod fsm;
pub mod logging;
pub mod movement;
pub mod questions;
pub mod quiz;
pub mod rng;
pub mod runtime;
pub mod timing;
pub mod trigger;
pub mod types;
