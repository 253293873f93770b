pub mod config;
pub mod dashboard;
pub mod decision;
pub mod error;
pub mod guard;
pub mod identity;
pub mod navigator;
pub mod profile;
pub mod role;
pub mod routes;
pub mod session;
pub mod subscription;

// Re-export primary public types for convenience.
pub use config::{GuardSettings, DEFAULT_PROFILE_TIMEOUT, DEFAULT_PROFILE_TIMEOUT_MS};
pub use dashboard::Dashboard;
pub use decision::{decide, Authorizer, Decision};
pub use error::SecurityError;
pub use guard::{AuthGuard, GuardHandle, GuardState, GuardView, NavControl, Phase, PortalChrome};
pub use identity::{Identity, Profile, Session};
pub use navigator::Navigator;
pub use profile::{ProfileChange, ProfileResolver, ProfileStore, Resolution};
pub use role::{AllowedRoles, Role};
pub use routes::PortalRoutes;
pub use session::{SessionChange, SessionChangeKind, SessionProvider};
pub use subscription::Subscription;

pub mod prelude {
    //! Re-exports of the most commonly used security types.
    pub use crate::{
        AllowedRoles, AuthGuard, Dashboard, Decision, GuardView, PortalRoutes, Profile, Role,
        Session, SessionProvider, ProfileStore, Navigator,
    };
}
