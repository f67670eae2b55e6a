//! Turtle Race - Frame-stepped race simulation
//!
//! Six racers drawn from an archetype catalog advance frame by frame,
//! each applying its ability in a fixed two-phase order. Finished races
//! are ranked and settled against a bet board. Rendering, persistence
//! and message delivery belong to the embedding host, which also
//! installs the `log` sink.

pub mod race_server;

pub use race_server::*;
