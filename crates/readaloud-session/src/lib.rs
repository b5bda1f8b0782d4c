#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod driver;
pub mod highlight;
pub mod observers;
pub mod registry;
pub mod session;
pub mod state;
pub mod throttle;

pub use driver::{SessionClosed, SessionCommand, SessionHandle};
pub use highlight::HighlightCoordinator;
pub use observers::{ObserverSet, SubscriptionId};
pub use registry::{
    EngineRegistry, InitReport, REASON_INIT_FALLBACK, REASON_RUNTIME_FALLBACK,
    REASON_USER_SWITCH, VoiceSettings,
};
pub use session::NarrationSession;
pub use state::{PlaybackState, UtteranceClock};
pub use throttle::{ReconfigureRequest, ReconfigureThrottle, ThrottleDecision};

// Dev-dependencies used only by the integration tests
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use tokio_test as _;
