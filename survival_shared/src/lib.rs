//! `survival_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Plain data model that serializes straight onto the wire.
//! - Clear separation of concerns (net, model, math, config).
//! - No `unsafe`.

pub mod config;
pub mod entity;
pub mod math;
pub mod model;
pub mod net;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::math::*;
    pub use crate::model::*;
    pub use crate::net::*;
}
