//! Focus session orchestration.

mod controller;

pub use controller::{CompletionOutcome, SessionController, SessionSettings, SessionSnapshot};
