//! Headless arena driver for Tank Arena.
//!
//! Runs battles and evolution without graphics. This crate is the
//! collaborator around `tank_core` that does I/O:
//!
//! - **Evaluation queue**: FIFO, one-at-a-time execution of battle tasks
//! - **Arena**: battle requests, generation advances and event publishing
//! - **Config**: RON arena configs and scenario registries
//! - **Export**: JSON run reports
//!
//! # Example
//!
//! ```bash
//! # Evolve for 20 generations and save a report
//! cargo run -p tank_headless -- evolve --generations 20 --output results/run.json
//!
//! # Fight one battle and print the result
//! cargo run -p tank_headless -- battle --scenario urban --seed 7
//!
//! # List scenarios
//! cargo run -p tank_headless -- scenarios
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod arena;
pub mod config;
pub mod export;
pub mod queue;

pub use arena::{Arena, ArenaError, ArenaEvent, BattleRequest};
pub use config::{load_registry, ArenaConfig, ConfigError};
pub use export::{BattleDigest, Champion, RunReport};
pub use queue::{EvaluationQueue, QueueError, TaskHandle};
