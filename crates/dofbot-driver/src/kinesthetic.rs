use crate::arm::{DofbotArm, JointCache, JointTargets};
use crate::Result;
use serde::{Deserialize, Serialize};
use serial_transport::ByteTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinestheticConfig {
    /// Release the servos so the arm can be moved by hand. Keep torque on when another
    /// controller is driving the arm and only the positions should be recorded.
    pub disable_torque: bool,
}

impl Default for KinestheticConfig {
    fn default() -> Self {
        Self {
            disable_torque: true,
        }
    }
}

/// Teaching by demonstration: the arm is moved by hand and its joint positions are
/// reported as the commanded action.
pub struct KinestheticSession<'a, T: ByteTransport> {
    arm: &'a mut DofbotArm<T>,
    cache: JointCache,
    released: bool,
}

impl<'a, T: ByteTransport> KinestheticSession<'a, T> {
    pub fn start(arm: &'a mut DofbotArm<T>, config: KinestheticConfig) -> Result<Self> {
        if config.disable_torque {
            tracing::info!("disabling torque for kinesthetic teaching");
            arm.bus_mut().set_torque(false)?;
        }
        tracing::info!("kinesthetic teaching enabled, move the arm by hand");
        Ok(Self {
            arm,
            cache: JointCache::new(),
            released: config.disable_torque,
        })
    }

    /// Current joint positions, taken as the demonstrated action.
    pub fn action(&mut self) -> Result<JointTargets> {
        let obs = self.arm.observe(&mut self.cache)?;
        Ok(obs.to_targets())
    }

    pub fn cache(&self) -> &JointCache {
        &self.cache
    }

    /// End the session, re-enabling torque if it was released.
    pub fn finish(self) -> Result<()> {
        let Self { arm, released, .. } = self;
        if released {
            tracing::info!("re-enabling torque");
            arm.bus_mut().set_torque(true)?;
        }
        Ok(())
    }
}
