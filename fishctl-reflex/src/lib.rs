//! fishctl-reflex: watches the centre of a screen cast for the fishing bobber
//! and reels in when it disappears.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod frame_loop;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use decision::{Action, AutomationState, Decision, DecisionEngine, LastAction};
pub use error::{Error, Result};
pub use executor::{ActionExecutor, ExecutorSettings, InputSink};
pub use frame_loop::{run_frame_loop, LoopSummary};
