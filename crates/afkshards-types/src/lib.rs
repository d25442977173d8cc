//! Shared vocabulary for afkshards.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - **Identity** ([`PlayerId`]): the opaque, stable key a session is
//!   stored under.
//! - **Space** ([`Position`]): a world-qualified coordinate with
//!   orientation, used for anchors, return points, and the AFK location.
//! - **Outcomes** ([`Notice`], [`Cue`]): every user-visible event the
//!   lifecycle engine can emit, keyed the way message templates expect.
//!
//! ```text
//! Session / Store / Engine (above)  ← all exchange these values
//!     ↕
//! Types (this crate)                ← no behavior beyond geometry helpers
//! ```

mod error;
mod notice;
mod types;

pub use error::TypesError;
pub use notice::{Cue, Notice};
pub use types::{PlayerId, Position};
