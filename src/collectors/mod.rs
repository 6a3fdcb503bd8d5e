//! Raw line producers: file tailing and the synthetic simulator

mod simulator;
mod tail_source;

pub use simulator::Simulator;
pub use tail_source::{TailSource, MAX_REOPEN_ATTEMPTS};
