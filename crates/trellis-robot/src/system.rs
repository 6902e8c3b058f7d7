//! System-level settings: the robot's computers and middleware options

use serde_json::Value;
use std::sync::{Arc, OnceLock};
use trellis_core::{
    Accessor, ConfigNode, Configurable, Export, FieldError, KeyedList, NodeOptions, Template,
};

use crate::host::Host;

/// Hosts keyed by hostname
pub type HostList = KeyedList<ConfigNode<Host>, String>;

/// Highest ROS 2 domain ID that maps onto valid UDP ports
pub const MAX_DOMAIN_ID: u8 = 232;

fn host_uid(host: &ConfigNode<Host>) -> String {
    host.get().hostname().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct System {
    username: String,
    domain_id: u8,
    hosts: HostList,
}

impl System {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn domain_id(&self) -> u8 {
        self.domain_id
    }

    pub fn hosts(&self) -> &HostList {
        &self.hosts
    }

    /// Host collection; uniqueness is enforced by the list itself
    pub fn hosts_mut(&mut self) -> &mut HostList {
        &mut self.hosts
    }
}

impl Default for System {
    fn default() -> Self {
        Self {
            username: "administrator".to_string(),
            domain_id: 0,
            hosts: KeyedList::new(host_uid),
        }
    }
}

impl Configurable for System {
    const ROOT_KEY: Option<&'static str> = Some("system");

    fn template() -> Arc<Template<Self>> {
        static TEMPLATE: OnceLock<Arc<Template<System>>> = OnceLock::new();
        TEMPLATE.get_or_init(build_template).clone()
    }
}

fn set_hosts(system: &mut System, value: &Value, options: &NodeOptions) -> Result<(), FieldError> {
    let entries = match value {
        Value::Null => return system.hosts.set_all(Vec::new()).map_err(FieldError::from),
        Value::Array(entries) => entries,
        other => return Err(FieldError::type_mismatch("a list of hosts", other)),
    };
    system.hosts.try_set_all(
        entries
            .iter()
            .map(|entry| ConfigNode::<Host>::from_value_within(entry, options).map_err(FieldError::from)),
    )
}

fn build_template() -> Arc<Template<System>> {
    let template = Template::builder()
        .field(
            "system.username",
            Accessor::typed(
                |s: &System| s.username.clone(),
                |s: &mut System, username: String| {
                    if username.is_empty() {
                        return Err(FieldError::validation("username must not be empty"));
                    }
                    s.username = username;
                    Ok(())
                },
            ),
        )
        .field(
            "system.ros2.domain_id",
            Accessor::typed(
                |s: &System| s.domain_id,
                |s: &mut System, domain_id: u8| {
                    if domain_id > MAX_DOMAIN_ID {
                        return Err(FieldError::validation(format!(
                            "domain_id {domain_id} exceeds {MAX_DOMAIN_ID}"
                        )));
                    }
                    s.domain_id = domain_id;
                    Ok(())
                },
            ),
        )
        .field(
            "system.hosts",
            Accessor::nested(|s: &System| s.hosts.to_value(), set_hosts),
        )
        .build();
    Arc::new(template.expect("system template paths are fixed and collision-free"))
}
