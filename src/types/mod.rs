//! Core value types.
//!
//! - [`id`]: identity of disposable units (`DisposableId`) and timeline
//!   instants (`Time`)

pub mod id;

pub use id::{DisposableId, Time};
