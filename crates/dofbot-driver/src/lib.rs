//! dofbot-driver: talk to a Dofbot SE arm over a serial line
//!
//! [`DofbotBus`] is the request/response device API: single and six-joint writes,
//! verified position reads, torque, LED and buzzer. [`DofbotArm`] layers the control
//! policy on top (home pose, cached observations, rate-limited actions), configured
//! through [`ArmConfig`].

mod error;
pub use error::{DeviceError, ReadFailure, Result};

mod metrics;
pub use metrics::{DeviceMetrics, MetricsHub};

mod bus;
pub use bus::{DofbotBus, ServoReading, Timing};

mod config;
pub use config::{load_config_file, ArmConfig, ConfigError, JointLimit, TimingConfig};

mod arm;
pub use arm::{DofbotArm, JointCache, JointTargets, Observation, READ_ONLY_QUIET};

mod kinesthetic;
pub use kinesthetic::{KinestheticConfig, KinestheticSession};

mod registry;
pub use registry::{ArmFactory, RobotRegistry};

#[cfg(feature = "mock")]
mod sim;

#[cfg(feature = "mock")]
pub use sim::SimulatedDofbot;
