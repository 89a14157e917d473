//! Session state reconciliation for the notype pill.
//!
//! - [`bridge`]: command invocation and push-event subscriptions over a probed transport
//! - [`gate`]: runtime dependency check
//! - [`state`]: the session state machine and its precedence rules
//! - [`position`]: drag-and-persist of the pill window
//! - [`settings`]: backend configuration access (`autoType` enforcement)
//! - [`client`]: the context object wiring all of the above together

pub mod bridge;
pub mod client;
pub mod gate;
pub mod position;
pub mod settings;
pub mod state;
pub mod transport;

pub use bridge::{Bridge, Subscription};
pub use client::SessionClient;
pub use gate::DependencyGate;
pub use position::{PointerTarget, PositionController};
pub use settings::SettingsSync;
pub use state::{PollOutcome, SessionMachine, StatusView, ToggleAction};
pub use transport::{LoopbackTransport, MemoryWindow, Transport, TransportProbe, WindowHandle};
