use crate::bus::{DofbotBus, ServoReading};
use crate::config::ArmConfig;
use crate::{DeviceError, DeviceMetrics, Result};
use dofbot_protocol::{JointId, ServoSpec, JOINT_COUNT};
use safety_guard::ensure_safe_goal_positions;
use serde::Serialize;
use serial_transport::ByteTransport;
use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Goal angles in degrees, by joint.
pub type JointTargets = BTreeMap<JointId, f64>;

/// Pause before reading in read-only mode, so an external controller can finish its
/// current exchange on the shared line.
pub const READ_ONLY_QUIET: Duration = Duration::from_millis(50);

/// Read failures are logged on the first miss and then once per this many.
const FAILURE_LOG_EVERY: u32 = 30;

/// Last good reading and consecutive failure count per joint. Owned by the caller and
/// carried across observe and send calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointCache {
    last_known: [Option<f64>; JOINT_COUNT],
    fail_counts: [u32; JOINT_COUNT],
}

impl JointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, joint: JointId, angle: f64) {
        self.last_known[joint.index()] = Some(angle);
        self.fail_counts[joint.index()] = 0;
    }

    /// Count a failed read; returns the consecutive failure count.
    pub fn record_failure(&mut self, joint: JointId) -> u32 {
        let count = &mut self.fail_counts[joint.index()];
        *count = count.saturating_add(1);
        *count
    }

    pub fn last_known(&self, joint: JointId) -> Option<f64> {
        self.last_known[joint.index()]
    }

    pub fn fail_count(&self, joint: JointId) -> u32 {
        self.fail_counts[joint.index()]
    }

    /// Last known angle, else the joint's static default.
    pub fn fallback(&self, joint: JointId) -> f64 {
        self.last_known(joint)
            .unwrap_or_else(|| ServoSpec::for_joint(joint).default_angle())
    }
}

/// Joint positions sampled in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// RFC 3339, UTC.
    pub timestamp: Option<String>,
    pub positions: BTreeMap<JointId, f64>,
    /// Joints whose value came from the cache or the default rather than the servo.
    pub fallback: Vec<JointId>,
}

impl Observation {
    pub fn to_targets(&self) -> JointTargets {
        self.positions.clone()
    }
}

/// A configured Dofbot SE arm: the bus plus the control policy around it.
pub struct DofbotArm<T: ByteTransport> {
    bus: DofbotBus<T>,
    config: ArmConfig,
}

impl<T: ByteTransport> DofbotArm<T> {
    /// Open the configured port and bring the arm into its ready state.
    pub fn open(config: ArmConfig) -> Result<Self> {
        config.validate()?;
        let bus = DofbotBus::open(&config.port, &config.serial_settings(), config.timing())?;
        Self::from_bus(bus, config)
    }

    pub fn connect(transport: T, config: ArmConfig) -> Result<Self> {
        config.validate()?;
        let bus = DofbotBus::connect(transport, config.timing())?;
        Self::from_bus(bus, config)
    }

    fn from_bus(bus: DofbotBus<T>, config: ArmConfig) -> Result<Self> {
        let mut arm = Self { bus, config };
        arm.configure()?;
        tracing::info!(port = %arm.config.port, read_only = arm.config.read_only, "arm connected");
        Ok(arm)
    }

    pub fn with_metrics(mut self, metrics: DeviceMetrics) -> Self {
        self.bus = self.bus.with_metrics(metrics);
        self
    }

    /// Torque on, LED green, move to the home pose. Read-only mode skips the torque and
    /// the move. A failed home move is logged; a transport failure is returned.
    pub fn configure(&mut self) -> Result<()> {
        if !self.config.read_only {
            self.bus.set_torque(true)?;
        }
        self.bus.set_led(0, 255, 0)?;
        if self.config.read_only {
            tracing::info!("skipping home position (read-only mode)");
            return Ok(());
        }
        let home = self.config.home_position;
        match self.bus.write_all(&home, self.config.home_duration_ms) {
            Ok(()) => {
                thread::sleep(Duration::from_millis(u64::from(self.config.home_duration_ms)));
                tracing::info!(?home, "moved to home position");
            }
            Err(e @ DeviceError::TransportUnavailable(_)) => return Err(e),
            Err(e) => tracing::warn!("failed to move to home position: {e}"),
        }
        Ok(())
    }

    /// In read-only mode actions are dropped and observation waits for a quiet line.
    pub fn set_read_only(&mut self, enabled: bool) {
        self.config.read_only = enabled;
        if enabled {
            tracing::info!("read-only mode enabled (external control)");
        } else {
            tracing::info!("read-only mode disabled");
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    pub fn bus_mut(&mut self) -> &mut DofbotBus<T> {
        &mut self.bus
    }

    /// Read all six joints. Joints that fail to read report their cached angle, or the
    /// static default when nothing was ever read.
    pub fn observe(&mut self, cache: &mut JointCache) -> Result<Observation> {
        if self.config.read_only {
            thread::sleep(READ_ONLY_QUIET);
        }
        let start = Instant::now();
        let mut positions = BTreeMap::new();
        let mut fallback = Vec::new();
        for joint in JointId::all() {
            let angle = match self.bus.read_servo(joint)? {
                ServoReading::Angle(angle) => {
                    cache.record_success(joint, angle);
                    angle
                }
                ServoReading::Absent(why) => {
                    let failures = cache.record_failure(joint);
                    if failures == 1 || failures % FAILURE_LOG_EVERY == 0 {
                        tracing::warn!(%joint, failures, "failed to read joint ({why}), using cached/default");
                    }
                    fallback.push(joint);
                    cache.fallback(joint)
                }
            };
            positions.insert(joint, angle);
        }
        tracing::debug!(elapsed_ms = start.elapsed().as_secs_f64() * 1e3, "read joint positions");
        Ok(Observation {
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            positions,
            fallback,
        })
    }

    /// Rate-limit, clip and send one action as a single write-all. Joints missing from
    /// `action` hold their present position. Returns the angles actually sent.
    pub fn send_action(
        &mut self,
        action: &JointTargets,
        cache: &mut JointCache,
    ) -> Result<JointTargets> {
        if self.config.read_only {
            tracing::debug!("read-only mode, skipping action");
            return Ok(action.clone());
        }
        let start = Instant::now();
        let mut goals = action.clone();

        if let Some(limit) = self.config.max_relative_target.clone() {
            let mut goal_present = BTreeMap::new();
            for (&joint, &goal) in action {
                let present = match self.bus.read_one(joint)? {
                    Some(angle) => {
                        cache.record_success(joint, angle);
                        Some(angle)
                    }
                    None => cache.last_known(joint),
                };
                // no reading and nothing cached: this joint goes unchecked
                if let Some(present) = present {
                    goal_present.insert(joint.name(), (goal, present));
                }
            }
            let safe = ensure_safe_goal_positions(&goal_present, &limit);
            for (name, angle) in safe.goals {
                if let Some(joint) = JointId::from_name(&name) {
                    goals.insert(joint, angle);
                }
            }
        }

        let mut angles = [0.0; JOINT_COUNT];
        for joint in JointId::all() {
            angles[joint.index()] = match goals.get(&joint) {
                Some(&goal) => self.config.joint_limit(joint).clip(goal),
                None => match self.bus.read_one(joint)? {
                    Some(angle) => {
                        cache.record_success(joint, angle);
                        angle
                    }
                    None => cache.fallback(joint),
                },
            };
        }

        if let Err(e) = self.bus.write_all(&angles, self.config.action_duration_ms) {
            tracing::error!("error sending action: {e}");
            return Err(e);
        }
        tracing::debug!(elapsed_ms = start.elapsed().as_secs_f64() * 1e3, "sent action");
        Ok(JointId::all().map(|j| (j, angles[j.index()])).collect())
    }

    /// Torque off (when configured) and LED red, then hand back the transport. Failures
    /// here are logged, never returned.
    pub fn disconnect(mut self) -> T {
        if self.config.disable_torque_on_disconnect {
            match self.bus.set_torque(false) {
                Ok(()) => tracing::info!("torque disabled"),
                Err(e) => tracing::warn!("failed to disable torque: {e}"),
            }
        }
        if let Err(e) = self.bus.set_led(255, 0, 0) {
            tracing::warn!("failed to set LED: {e}");
        }
        tracing::info!(port = %self.config.port, "arm disconnected");
        self.bus.into_transport()
    }
}
