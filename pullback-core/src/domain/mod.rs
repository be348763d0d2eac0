//! Domain types for the pullback pipeline

pub mod bar;
pub mod ids;

pub use bar::{validate_bars, Bar, BarError, BarField};
pub use ids::{ConfigHash, SessionId};
