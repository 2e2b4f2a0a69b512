//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: event
//! and user data, consumer rules, the consumer/transport traits and errors.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Event Model
//! - Event names are dot-delimited namespaces (`app.user.login`)
//! - Properties are a closed union of string / number / bool / nested map

mod blueprint;
mod consumer;
mod delivery;
mod error;
mod properties;
mod rule;
mod user;

pub use blueprint::*;
pub use consumer::{Consumer, LocalTransport, Transport};
pub use delivery::{Delivery, DeliveryStats};
pub use error::*;
pub use properties::{Properties, PropertyValue};
pub use rule::{ConsumerRule, DenyParameters, WILDCARD};
pub use user::CurrentUser;
