pub mod brain;
pub mod capabilities;
pub mod config;
pub mod controller;
pub mod monitors;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use brain::MasterBrain;
pub use config::{DynamicConfig, RoleProviders, RuntimeConfig, SystemConfig};
pub use controller::Controller;
pub use monitors::{MonitorManager, MonitorOutcome};
pub use parser::{parse_directive, ArgValue, ParsedCall};
pub use registry::{CapabilityRegistry, ArgMap};
pub use scheduler::{ScheduleSlots, Scheduler};
pub use session::SessionStore;
pub use transport::ChatTransport;
