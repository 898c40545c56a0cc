//! Domain types
//!
//! Validated newtypes shared by every component:
//! - [`Threshold`] - Minimum shares required for reconstruction (2..=255)
//! - [`ShareIndex`] - Evaluation point of a share (1..=255)
//! - [`ShareCount`] - Total number of shares to create (1..=254)
//! - [`SplitConfig`] - Validated threshold and share count pair
//! - [`GuardianId`], [`ItemId`], [`EventId`] - Identifiers
//! - [`Role`] - Caller role resolved once at the authorization boundary

mod config;
mod ids;
mod role;
mod share_count;
mod share_index;
mod threshold;

pub use config::SplitConfig;
pub use ids::{EventId, GuardianId, ItemId};
pub use role::{Action, Role};
pub use share_count::ShareCount;
pub use share_index::ShareIndex;
pub use threshold::Threshold;
