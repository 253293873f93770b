mod driver;
pub mod machine;
pub mod view;

pub use driver::{AuthGuard, GuardHandle};
pub use machine::{Effect, GuardEvent, GuardMachine, GuardState, Phase};
pub use view::{GuardView, NavControl, PortalChrome};
