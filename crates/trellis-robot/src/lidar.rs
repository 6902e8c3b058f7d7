//! 2D lidar sensors
//!
//! Lidars live in an ordered list; their name, topic, and IP address are
//! derived from their index so that each sensor on the robot gets a distinct
//! identity without the user spelling it out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::f64::consts::PI;
use std::net::Ipv4Addr;
use std::sync::{Arc, OnceLock};
use tracing::trace;
use trellis_core::{Accessor, Configurable, FieldError, Indexed, Template};

use crate::parse_ipv4;

/// Address of the lidar at index 0; later lidars count up from here
pub const BASE_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 131, 20);

const BASE_NAME: &str = "lidar2d";

/// Supported 2D lidar models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LidarModel {
    HokuyoUst,
    SickLms1xx,
}

impl LidarModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HokuyoUst => "hokuyo_ust",
            Self::SickLms1xx => "sick_lms1xx",
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            Self::HokuyoUst => 10940,
            Self::SickLms1xx => 2111,
        }
    }
}

impl From<LidarModel> for Value {
    fn from(model: LidarModel) -> Self {
        Value::from(model.as_str())
    }
}

/// A planar scanning lidar
#[derive(Debug, Clone, PartialEq)]
pub struct Lidar2d {
    idx: usize,
    name: String,
    topic: String,
    ip: Ipv4Addr,
    port: u16,
    model: LidarModel,
    urdf_enabled: bool,
    parent: String,
    /// Scan limits in radians
    min_angle: f64,
    max_angle: f64,
}

impl Lidar2d {
    pub fn new(model: LidarModel) -> Self {
        let mut lidar = Self {
            idx: 0,
            name: String::new(),
            topic: String::new(),
            ip: BASE_IP,
            port: model.default_port(),
            model,
            urdf_enabled: true,
            parent: "base_link".to_string(),
            min_angle: -PI,
            max_angle: PI,
        };
        lidar.set_index(0);
        lidar
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn model(&self) -> LidarModel {
        self.model
    }

    pub fn angle_range(&self) -> (f64, f64) {
        (self.min_angle, self.max_angle)
    }
}

impl Default for Lidar2d {
    fn default() -> Self {
        Self::new(LidarModel::HokuyoUst)
    }
}

impl Indexed for Lidar2d {
    fn index(&self) -> usize {
        self.idx
    }

    fn set_index(&mut self, index: usize) {
        self.idx = index;
        self.name = format!("{BASE_NAME}_{index}");
        self.topic = format!("sensors/{}/scan", self.name);
        let offset = u32::try_from(index).unwrap_or(u32::MAX);
        self.ip = Ipv4Addr::from(u32::from(BASE_IP).saturating_add(offset));
        trace!(name = %self.name, ip = %self.ip, "Reindexed lidar");
    }
}

fn check_angle(angle: f64) -> Result<f64, FieldError> {
    if (-PI..=PI).contains(&angle) {
        Ok(angle)
    } else {
        Err(FieldError::validation(format!(
            "angle {angle} outside of [-pi, pi]"
        )))
    }
}

impl Configurable for Lidar2d {
    fn template() -> Arc<Template<Self>> {
        static TEMPLATE: OnceLock<Arc<Template<Lidar2d>>> = OnceLock::new();
        TEMPLATE.get_or_init(build_template).clone()
    }
}

fn build_template() -> Arc<Template<Lidar2d>> {
    let template = Template::builder()
        .field(
            "name",
            Accessor::typed(
                |l: &Lidar2d| l.name.clone(),
                |l: &mut Lidar2d, name: String| {
                    l.name = name;
                    Ok(())
                },
            ),
        )
        .field(
            "topic",
            Accessor::typed(
                |l: &Lidar2d| l.topic.clone(),
                |l: &mut Lidar2d, topic: String| {
                    l.topic = topic;
                    Ok(())
                },
            ),
        )
        .field(
            "model",
            Accessor::typed(
                |l: &Lidar2d| l.model,
                |l: &mut Lidar2d, model: LidarModel| {
                    l.model = model;
                    Ok(())
                },
            ),
        )
        .field(
            "ip",
            Accessor::new(
                |l: &Lidar2d| Value::from(l.ip.to_string()),
                |l: &mut Lidar2d, value: &Value| {
                    l.ip = parse_ipv4(value)?;
                    Ok(())
                },
            ),
        )
        .field(
            "port",
            Accessor::typed(
                |l: &Lidar2d| l.port,
                |l: &mut Lidar2d, port: u16| {
                    if port == 0 {
                        return Err(FieldError::validation("port must be non-zero"));
                    }
                    l.port = port;
                    Ok(())
                },
            ),
        )
        .field(
            "urdf.enabled",
            Accessor::typed(
                |l: &Lidar2d| l.urdf_enabled,
                |l: &mut Lidar2d, enabled: bool| {
                    l.urdf_enabled = enabled;
                    Ok(())
                },
            ),
        )
        .field(
            "urdf.parent",
            Accessor::typed(
                |l: &Lidar2d| l.parent.clone(),
                |l: &mut Lidar2d, parent: String| {
                    l.parent = parent;
                    Ok(())
                },
            ),
        )
        .field(
            "ros_parameters.min_angle",
            Accessor::typed(
                |l: &Lidar2d| l.min_angle,
                |l: &mut Lidar2d, angle: f64| {
                    l.min_angle = check_angle(angle)?;
                    Ok(())
                },
            ),
        )
        .field(
            "ros_parameters.max_angle",
            Accessor::typed(
                |l: &Lidar2d| l.max_angle,
                |l: &mut Lidar2d, angle: f64| {
                    l.max_angle = check_angle(angle)?;
                    Ok(())
                },
            ),
        )
        .build();
    Arc::new(template.expect("lidar template paths are fixed and collision-free"))
}
