//! Request routing.
//!
//! - [`context`] - The per-request routing state
//! - [`stage`] - The stage matching requests against the resource model

pub mod context;
pub mod stage;

pub use context::{ResourceInfo, RoutingContext, RoutingState};
pub use stage::RoutingStage;
