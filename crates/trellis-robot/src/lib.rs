//! Trellis Robot - Robot configuration entities built on trellis-core
//!
//! Each entity is a plain struct that describes its configuration paths with a
//! template; binding a document goes through [`ConfigNode`]:
//! - [`Host`]: a computer on the robot network, kept in a list keyed by hostname
//! - [`System`]: user, middleware, and host settings under the `system` key
//! - [`Lidar2d`]: a planar lidar whose name, topic, and address follow its index
//! - [`Robot`]: the whole document, composing the above

pub mod host;
pub mod lidar;
pub mod robot;
pub mod system;

use serde_json::Value;
use std::net::Ipv4Addr;
use trellis_core::{BindError, ConfigNode, FieldError};

pub use host::Host;
pub use lidar::{Lidar2d, LidarModel};
pub use robot::{LidarList, Robot, SUPPORTED_VERSION};
pub use system::{HostList, System, MAX_DOMAIN_ID};

/// Bind a full robot document onto the defaults
pub fn load(doc: &Value) -> Result<ConfigNode<Robot>, BindError> {
    ConfigNode::from_value(doc)
}

pub(crate) fn parse_ipv4(value: &Value) -> Result<Ipv4Addr, FieldError> {
    let text = value
        .as_str()
        .ok_or_else(|| FieldError::type_mismatch("an IPv4 address string", value))?;
    text.parse()
        .map_err(|_| FieldError::validation(format!("invalid IPv4 address {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(
            parse_ipv4(&json!("10.0.0.7")).unwrap(),
            Ipv4Addr::new(10, 0, 0, 7)
        );
        assert!(matches!(
            parse_ipv4(&json!("10.0.0.256")),
            Err(FieldError::Validation(_))
        ));
        assert!(matches!(parse_ipv4(&json!(null)), Err(FieldError::Type { .. })));
    }

    #[test]
    fn test_load_rejects_non_mapping() {
        let err = load(&json!("robot")).unwrap_err();
        assert_eq!(err, BindError::NotAMapping("a string"));
    }
}
