//! Top-level robot configuration

use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::debug;
use trellis_core::{
    Accessor, ConfigNode, Configurable, Export, FieldError, IndexedList, NodeOptions, Template,
};

use crate::lidar::Lidar2d;
use crate::system::System;

/// Only configuration schema version understood by this crate
pub const SUPPORTED_VERSION: u32 = 0;

pub type LidarList = IndexedList<ConfigNode<Lidar2d>>;

/// A complete robot: identity, system settings, and attached sensors
#[derive(Debug, Clone, PartialEq)]
pub struct Robot {
    serial_number: String,
    version: u32,
    system: ConfigNode<System>,
    lidar2d: LidarList,
}

impl Robot {
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Platform model prefix of the serial number (e.g. "a200")
    pub fn model(&self) -> &str {
        self.serial_number
            .split_once('-')
            .map_or(self.serial_number.as_str(), |(model, _)| model)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn system(&self) -> &ConfigNode<System> {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut ConfigNode<System> {
        &mut self.system
    }

    pub fn lidar2d(&self) -> &LidarList {
        &self.lidar2d
    }

    /// Lidar collection; indices are maintained by the list itself
    pub fn lidar2d_mut(&mut self) -> &mut LidarList {
        &mut self.lidar2d
    }
}

impl Default for Robot {
    fn default() -> Self {
        Self {
            serial_number: "generic".to_string(),
            version: SUPPORTED_VERSION,
            system: ConfigNode::from_defaults(),
            lidar2d: IndexedList::new(),
        }
    }
}

/// Accepts "generic" or `<model>-<digits>`, e.g. "a200-0001"
fn validate_serial_number(serial: &str) -> Result<(), FieldError> {
    if serial == "generic" {
        return Ok(());
    }
    let valid = serial.split_once('-').is_some_and(|(model, unit)| {
        !model.is_empty()
            && model.chars().all(|c| c.is_ascii_alphanumeric())
            && !unit.is_empty()
            && unit.chars().all(|c| c.is_ascii_digit())
    });
    if valid {
        Ok(())
    } else {
        Err(FieldError::validation(format!(
            "serial number {serial:?} must look like <model>-<number>"
        )))
    }
}

impl Configurable for Robot {
    fn template() -> Arc<Template<Self>> {
        static TEMPLATE: OnceLock<Arc<Template<Robot>>> = OnceLock::new();
        TEMPLATE.get_or_init(build_template).clone()
    }
}

fn set_lidars(robot: &mut Robot, value: &Value, options: &NodeOptions) -> Result<(), FieldError> {
    let entries = match value {
        Value::Null => return robot.lidar2d.set_all(Vec::new()).map_err(FieldError::from),
        Value::Array(entries) => entries,
        other => return Err(FieldError::type_mismatch("a list of lidars", other)),
    };
    robot.lidar2d.try_set_all(
        entries
            .iter()
            .map(|entry| {
                ConfigNode::<Lidar2d>::from_value_within(entry, options).map_err(FieldError::from)
            }),
    )?;
    debug!(count = robot.lidar2d.len(), "Bound 2D lidars");
    Ok(())
}

fn build_template() -> Arc<Template<Robot>> {
    let template = Template::builder()
        .field(
            "serial_number",
            Accessor::typed(
                |r: &Robot| r.serial_number.clone(),
                |r: &mut Robot, serial: String| {
                    validate_serial_number(&serial)?;
                    r.serial_number = serial;
                    Ok(())
                },
            ),
        )
        .field(
            "version",
            Accessor::typed(
                |r: &Robot| r.version,
                |r: &mut Robot, version: u32| {
                    if version != SUPPORTED_VERSION {
                        return Err(FieldError::validation(format!(
                            "unsupported version {version}, expected {SUPPORTED_VERSION}"
                        )));
                    }
                    r.version = version;
                    Ok(())
                },
            ),
        )
        .field(
            "system",
            Accessor::nested(
                |r: &Robot| r.system.body(),
                |r: &mut Robot, value: &Value, options: &NodeOptions| {
                    r.system.apply_within(value, options)?;
                    Ok(())
                },
            ),
        )
        .field(
            "sensors.lidar2d",
            Accessor::nested(|r: &Robot| r.lidar2d.to_value(), set_lidars),
        )
        .build();
    Arc::new(template.expect("robot template paths are fixed and collision-free"))
}
