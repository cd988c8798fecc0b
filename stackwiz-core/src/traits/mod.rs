//! Seams to the outside world: time, public IP detection and the container runtime

mod clock;
mod container_runtime;
mod ip_resolver;

pub use clock::{Clock, SystemClock};
pub use container_runtime::{ContainerRuntime, RunOutput};
pub use ip_resolver::PublicIpResolver;
