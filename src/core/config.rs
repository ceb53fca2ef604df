//! Tuning configuration
//!
//! Every behaviour parameter of the three enemy types lives here so levels can
//! be tuned from data files. Configs load from and save to RON or JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::physics::OBSTRUCTION_GROUP;

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// RON (de)serialization failed
    #[error("RON error: {0}")]
    Ron(String),
    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of its valid range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Sensing parameters shared by all controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Maximum engagement distance
    pub range: f32,
    /// Full view cone angle in degrees
    pub field_of_view: f32,
    /// Collision groups that block line of sight
    pub obstruction_mask: u32,
    /// Whether the view check also requires the target to be within `range`
    pub view_requires_range: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            range: 20.0,
            field_of_view: 80.0,
            obstruction_mask: OBSTRUCTION_GROUP,
            view_requires_range: false,
        }
    }
}

/// Parameters every controller has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Starting health
    pub health: f32,
    /// Vision and range
    pub sensors: SensorConfig,
    /// Turn speed in degrees per second
    pub turn_speed: f32,
    /// Seconds between idle-look heading changes
    pub idle_look_time: f32,
    /// Idle-look turn speed in degrees per second
    pub idle_rotation_speed: f32,
    /// Seconds between shots of an automatic weapon
    pub fire_rate: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            health: 100.0,
            sensors: SensorConfig::default(),
            turn_speed: 90.0,
            idle_look_time: 3.0,
            idle_rotation_speed: 90.0,
            fire_rate: 1.0,
        }
    }
}

/// Projectile parameters of an enemy's weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    /// Launch speed of a shot
    pub shot_speed: f32,
    /// Damage carried by a shot
    pub damage: f32,
    /// Seconds a charged weapon needs before it can fire
    pub charge_time: f32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            shot_speed: 20.0,
            damage: 10.0,
            charge_time: 1.0,
        }
    }
}

/// Grunt tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GruntConfig {
    /// Shared controller parameters
    pub controller: ControllerConfig,
    /// Weapon parameters
    pub weapon: WeaponConfig,
    /// Pursuit speed
    pub move_speed: f32,
    /// Sideways speed while strafing
    pub strafe_speed: f32,
    /// Range `[min, max]` of seconds between strafe direction changes
    pub strafe_duration: [f32; 2],
    /// Maximum velocity change per second
    pub acceleration: f32,
    /// Linear drag applied while braking
    pub braking_drag: f32,
    /// Distance at which the last known position counts as reached
    pub target_reached_threshold: f32,
    /// Navigation agent stopping distance
    pub stopping_distance: f32,
}

impl Default for GruntConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            weapon: WeaponConfig::default(),
            move_speed: 5.0,
            strafe_speed: 3.0,
            strafe_duration: [1.0, 3.0],
            acceleration: 10.0,
            braking_drag: 5.0,
            target_reached_threshold: 1.5,
            stopping_distance: 0.5,
        }
    }
}

/// How a tank uses its weapon while distancing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TankFirePolicy {
    /// Hold the trigger of an automatic weapon
    Direct,
    /// Charge, then fire when aimed within `aim_window` degrees, then wait `cooldown`
    Charged {
        /// Seconds after a shot before charging again
        cooldown: f32,
        /// Maximum aim error in degrees at which a charged shot is released
        aim_window: f32,
    },
}

impl Default for TankFirePolicy {
    fn default() -> Self {
        Self::Charged {
            cooldown: 2.0,
            aim_window: 10.0,
        }
    }
}

/// Tank tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    /// Shared controller parameters
    pub controller: ControllerConfig,
    /// Weapon parameters
    pub weapon: WeaponConfig,
    /// Weapon usage policy
    pub fire_policy: TankFirePolicy,
    /// Navigation speed
    pub move_speed: f32,
    /// Distance at which a patrol point counts as reached
    pub patrol_point_reach_threshold: f32,
    /// Seconds between standoff recalculations
    pub recalculate_interval: f32,
    /// Slack below `range` before the tank backs off
    pub standoff_buffer: f32,
    /// Radius used to snap retreat points onto the nav mesh
    pub retreat_sample_radius: f32,
    /// Retreat distance tried when the ideal point is not navigable
    pub retreat_fallback_distance: f32,
    /// Navigation agent stopping distance
    pub stopping_distance: f32,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            weapon: WeaponConfig {
                shot_speed: 30.0,
                damage: 35.0,
                charge_time: 1.5,
            },
            fire_policy: TankFirePolicy::default(),
            move_speed: 4.0,
            patrol_point_reach_threshold: 1.5,
            recalculate_interval: 1.0,
            standoff_buffer: 0.5,
            retreat_sample_radius: 4.0,
            retreat_fallback_distance: 5.0,
            stopping_distance: 0.5,
        }
    }
}

/// Turret tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    /// Shared controller parameters
    pub controller: ControllerConfig,
    /// Weapon parameters
    pub weapon: WeaponConfig,
    /// Seconds the turret keeps engaging a target it cannot see
    pub engagement_timeout: f32,
    /// Seconds after a shot before the turret charges again
    pub cooldown: f32,
    /// Gravity used for the ballistic launch speed
    pub effective_gravity: f32,
    /// Whether aiming rotates a separate head instead of the base
    pub has_head: bool,
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            weapon: WeaponConfig {
                shot_speed: 20.0,
                damage: 50.0,
                charge_time: 1.0,
            },
            engagement_timeout: 5.0,
            cooldown: 3.0,
            effective_gravity: 8.82,
            has_head: true,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds
    pub fixed_dt: f32,
    /// Seed for every controller's random stream
    pub seed: u64,
    /// Grunt tuning
    pub grunt: GruntConfig,
    /// Tank tuning
    pub tank: TankConfig,
    /// Turret tuning
    pub turret: TurretConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            seed: 0x5EED,
            grunt: GruntConfig::default(),
            tank: TankConfig::default(),
            turret: TurretConfig::default(),
        }
    }
}

impl SimConfig {
    /// Set the fixed timestep
    pub fn with_fixed_dt(mut self, fixed_dt: f32) -> Self {
        self.fixed_dt = fixed_dt;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the grunt tuning
    pub fn with_grunt(mut self, grunt: GruntConfig) -> Self {
        self.grunt = grunt;
        self
    }

    /// Replace the tank tuning
    pub fn with_tank(mut self, tank: TankConfig) -> Self {
        self.tank = tank;
        self
    }

    /// Replace the turret tuning
    pub fn with_turret(mut self, turret: TurretConfig) -> Self {
        self.turret = turret;
        self
    }

    /// Check every value is in its valid range.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_dt > 0.0) {
            return Err(invalid("fixed_dt must be positive"));
        }

        validate_controller("grunt", &self.grunt.controller)?;
        validate_controller("tank", &self.tank.controller)?;
        validate_controller("turret", &self.turret.controller)?;

        let [min, max] = self.grunt.strafe_duration;
        if min < 0.0 || max < min {
            return Err(invalid("grunt.strafe_duration must be [min, max] with 0 <= min <= max"));
        }
        if self.grunt.acceleration <= 0.0 {
            return Err(invalid("grunt.acceleration must be positive"));
        }
        if self.tank.recalculate_interval <= 0.0 {
            return Err(invalid("tank.recalculate_interval must be positive"));
        }
        if self.turret.effective_gravity <= 0.0 {
            return Err(invalid("turret.effective_gravity must be positive"));
        }
        if let TankFirePolicy::Charged { aim_window, .. } = self.tank.fire_policy
            && !(0.0..=180.0).contains(&aim_window)
        {
            return Err(invalid("tank.fire_policy.aim_window must be within [0, 180]"));
        }

        Ok(())
    }

    /// Save the config to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Ron(e.to_string()))?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    /// Load and validate a config from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Parse and validate a config from RON text
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig =
            ron::from_str(content).map_err(|e| ConfigError::Ron(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }

    /// Load and validate a config from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config, picking the format from the file extension (`.json` or RON).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::load_json(path),
            _ => Self::load_ron(path),
        }
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

fn validate_controller(kind: &str, config: &ControllerConfig) -> Result<(), ConfigError> {
    if config.health <= 0.0 {
        return Err(ConfigError::Invalid(format!("{kind}.health must be positive")));
    }
    if config.sensors.range <= 0.0 {
        return Err(ConfigError::Invalid(format!("{kind}.sensors.range must be positive")));
    }
    let fov = config.sensors.field_of_view;
    if !(fov > 0.0 && fov <= 360.0) {
        return Err(ConfigError::Invalid(format!(
            "{kind}.sensors.field_of_view must be within (0, 360]"
        )));
    }
    if config.turn_speed < 0.0 || config.idle_rotation_speed < 0.0 {
        return Err(ConfigError::Invalid(format!("{kind} turn speeds must not be negative")));
    }
    Ok(())
}
