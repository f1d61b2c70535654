//! Shared conversation types.

pub mod turn;

pub use turn::{FlowHint, Role, Turn};
