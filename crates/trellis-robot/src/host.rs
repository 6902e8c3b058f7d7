//! Networked computers that make up a robot

use serde_json::Value;
use std::net::Ipv4Addr;
use std::sync::{Arc, OnceLock};
use trellis_core::{Accessor, Configurable, FieldError, Template};

use crate::parse_ipv4;

/// A computer on the robot network, identified by hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    hostname: String,
    ip: Ipv4Addr,
}

impl Host {
    pub fn new(hostname: &str, ip: Ipv4Addr) -> Result<Self, FieldError> {
        validate_hostname(hostname)?;
        Ok(Self {
            hostname: hostname.to_string(),
            ip,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }
}

impl Default for Host {
    fn default() -> Self {
        Self {
            hostname: "cpr-robot".to_string(),
            ip: Ipv4Addr::new(192, 168, 131, 1),
        }
    }
}

/// RFC 1123 label: 1-63 alphanumerics or hyphens, not starting or ending with a hyphen
fn validate_hostname(hostname: &str) -> Result<(), FieldError> {
    let valid = (1..=63).contains(&hostname.len())
        && hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !hostname.starts_with('-')
        && !hostname.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(FieldError::validation(format!("invalid hostname {hostname:?}")))
    }
}

impl Configurable for Host {
    fn template() -> Arc<Template<Self>> {
        static TEMPLATE: OnceLock<Arc<Template<Host>>> = OnceLock::new();
        TEMPLATE.get_or_init(build_template).clone()
    }
}

fn build_template() -> Arc<Template<Host>> {
    let template = Template::builder()
        .field(
            "hostname",
            Accessor::typed(
                |h: &Host| h.hostname.clone(),
                |h: &mut Host, hostname: String| {
                    validate_hostname(&hostname)?;
                    h.hostname = hostname;
                    Ok(())
                },
            ),
        )
        .field(
            "ip",
            Accessor::new(
                |h: &Host| Value::from(h.ip.to_string()),
                |h: &mut Host, value: &Value| {
                    h.ip = parse_ipv4(value)?;
                    Ok(())
                },
            ),
        )
        .build();
    Arc::new(template.expect("host template paths are fixed and collision-free"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::{BindError, ConfigNode, Export};

    #[test]
    fn test_host_from_value() {
        let node = ConfigNode::<Host>::from_value(&json!({
            "hostname": "cpr-a200-0001",
            "ip": "192.168.131.10"
        }))
        .unwrap();
        assert_eq!(node.get().hostname(), "cpr-a200-0001");
        assert_eq!(node.get().ip(), Ipv4Addr::new(192, 168, 131, 10));
        assert_eq!(
            node.to_value(),
            json!({"hostname": "cpr-a200-0001", "ip": "192.168.131.10"})
        );
    }

    #[test]
    fn test_host_defaults() {
        let node = ConfigNode::<Host>::from_value(&json!({"hostname": "backpack"})).unwrap();
        assert_eq!(node.get().ip(), Ipv4Addr::new(192, 168, 131, 1));
    }

    #[test]
    fn test_invalid_hostname() {
        assert!(Host::new("-bad", Ipv4Addr::LOCALHOST).is_err());
        assert!(Host::new("has space", Ipv4Addr::LOCALHOST).is_err());
        assert!(Host::new("", Ipv4Addr::LOCALHOST).is_err());
        assert!(Host::new("cpr-j100-0042", Ipv4Addr::LOCALHOST).is_ok());

        let err = ConfigNode::<Host>::from_value(&json!({"hostname": "bad_host"})).unwrap_err();
        assert!(matches!(err, BindError::Field { ref path, .. } if path == "hostname"));
    }

    #[test]
    fn test_invalid_ip() {
        let err = ConfigNode::<Host>::from_value(&json!({"ip": "192.168.1"})).unwrap_err();
        assert!(matches!(
            err,
            BindError::Field { ref path, source: FieldError::Validation(_) } if path == "ip"
        ));

        let err = ConfigNode::<Host>::from_value(&json!({"ip": 42})).unwrap_err();
        assert!(matches!(err, BindError::Field { source: FieldError::Type { .. }, .. }));
    }
}
