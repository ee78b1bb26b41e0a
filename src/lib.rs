//! cohort - condition leasing and adaptive trial sequencing for online studies
//!
//! A participant arrives, leases exactly one unused experimental condition
//! from a shared pool, is walked through instructions, a comprehension quiz
//! and a block-structured betting task, and releases the condition when the
//! session ends.
//!
//! ## Components
//!
//! - **Store**: SQLite table of condition records with atomic allocate/release
//! - **Server**: HTTP transport for allocation, release and session hand-off
//! - **Client**: `LeaseService` seam with HTTP and in-process implementations
//! - **Content**: trial payload and problem bank contracts
//! - **Bets / Bonus**: bet vectors and the per-trial bonus computation
//! - **Timeline**: the single-threaded trial sequencing state machine
//! - **Participant**: scripted participant for simulation and tests

pub mod bets;
pub mod bonus;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod participant;
pub mod server;
pub mod session;
pub mod store;
pub mod timeline;

pub use config::Config;
pub use error::{CohortError, StoreError};
pub use store::{ConditionRecord, LeaseStore, PoolStats};
pub use timeline::{SessionOutcome, TimelineController};
