pub mod engine;
pub mod states;

pub use engine::LifecycleEngine;
pub use states::{QuotationAction, TransitionOutcome};
