use crate::arm::DofbotArm;
use crate::config::ArmConfig;
use crate::{DeviceError, Result};
use serial_transport::ByteTransport;
use std::collections::BTreeMap;

/// Builds a connected arm from its configuration.
pub type ArmFactory<T> = fn(ArmConfig) -> Result<DofbotArm<T>>;

/// Robot types by name.
pub struct RobotRegistry<T: ByteTransport> {
    factories: BTreeMap<&'static str, ArmFactory<T>>,
}

impl<T: ByteTransport> RobotRegistry<T> {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every robot type this crate knows how to drive.
    pub fn with_builtin() -> Self {
        let mut reg = Self::empty();
        reg.register("dofbot_se", DofbotArm::open);
        reg
    }

    pub fn register(&mut self, name: &'static str, factory: ArmFactory<T>) {
        if self.factories.insert(name, factory).is_some() {
            tracing::warn!(name, "replacing registered robot type");
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn create(&self, name: &str, config: ArmConfig) -> Result<DofbotArm<T>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DeviceError::UnknownRobot {
                name: name.to_string(),
                known: self.names().join(", "),
            })?;
        tracing::debug!(name, port = %config.port, "creating robot");
        factory(config)
    }
}

impl<T: ByteTransport> Default for RobotRegistry<T> {
    fn default() -> Self {
        Self::with_builtin()
    }
}
