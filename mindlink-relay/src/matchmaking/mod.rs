pub mod coordinator;
pub mod events;
pub mod monitor;
pub mod pool;
pub mod registry;
pub mod signaling;

pub use coordinator::MatchCoordinator;
pub use events::{Effects, Event, Outbound, ServerEvent, SignalKind, TimerCommand};
pub use monitor::SessionMonitor;
pub use pool::WaitingPool;
pub use registry::ConnectionRegistry;
