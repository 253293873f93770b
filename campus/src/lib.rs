//! Campus: session/role resolution and page guards for the school portals.
//!
//! This facade crate re-exports the campus sub-crates through a single
//! dependency with feature flags:
//!
//! ```ignore
//! use campus::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature     | Default | Crate             |
//! |-------------|---------|-------------------|
//! | `security`  | **yes** | `campus-security` |
//! | `test-util` | no      | `campus-test`     |
//! | `full`      | no      | All of the above  |

pub use campus_core::*;

#[cfg(feature = "security")]
pub use campus_security;

#[cfg(feature = "test-util")]
pub use campus_test;

pub mod prelude {
    pub use campus_core::prelude::*;

    #[cfg(feature = "security")]
    pub use campus_security::prelude::*;
}
