//! Tenants, properties and devices.
//!
//! Built once from configuration and shared read-only (`Arc<Topology>`)
//! across generation workers.

use crate::config::{DeviceConfig, GeneratorConfig};
use crate::error::{GeneratorError, Result};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashSet;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub make: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub location: GeoPoint,
    pub boundary_id: String,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub timezone: Tz,
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub properties: Vec<Property>,
}

/// Position of a device within the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    pub tenant: usize,
    pub property: usize,
    pub device: usize,
}

/// A device together with its owning property and tenant.
#[derive(Debug, Clone, Copy)]
pub struct DeviceRef<'a> {
    pub tenant: &'a Tenant,
    pub property: &'a Property,
    pub device: &'a Device,
}

#[derive(Debug, Clone)]
pub struct Topology {
    tenants: Vec<Tenant>,
}

impl Topology {
    /// Build and validate the topology.
    ///
    /// Ids must be unique within their scope: tenants across the topology,
    /// properties within a tenant, devices within a property.
    pub fn load(config: &GeneratorConfig) -> Result<Self> {
        let mut tenant_ids = HashSet::new();
        let mut tenants = Vec::with_capacity(config.tenants.len());

        for tenant in &config.tenants {
            require_id("tenant", &tenant.id)?;
            if !tenant_ids.insert(tenant.id.as_str()) {
                return Err(GeneratorError::config(format!("duplicate tenant id '{}'", tenant.id)));
            }

            let mut property_ids = HashSet::new();
            let mut properties = Vec::with_capacity(tenant.properties.len());

            for property in &tenant.properties {
                require_id("property", &property.id)?;
                if !property_ids.insert(property.id.as_str()) {
                    return Err(GeneratorError::config(format!(
                        "duplicate property id '{}' in tenant '{}'",
                        property.id, tenant.id
                    )));
                }

                let timezone: Tz = property.timezone.parse().map_err(|_| {
                    GeneratorError::config(format!(
                        "property '{}': unknown timezone '{}'",
                        property.id, property.timezone
                    ))
                })?;

                let mut device_ids = HashSet::new();
                let mut devices = Vec::with_capacity(property.devices.len());
                for device in &property.devices {
                    require_id("device", &device.id)?;
                    if !device_ids.insert(device.id.as_str()) {
                        return Err(GeneratorError::config(format!(
                            "duplicate device id '{}' in property '{}'",
                            device.id, property.id
                        )));
                    }
                    devices.push(build_device(device)?);
                }

                properties.push(Property {
                    id: property.id.clone(),
                    name: property.name.clone(),
                    timezone,
                    devices,
                });
            }

            tenants.push(Tenant {
                id: tenant.id.clone(),
                name: tenant.name.clone(),
                properties,
            });
        }

        let topology = Self { tenants };
        if topology.device_count() == 0 {
            return Err(GeneratorError::config("topology contains no devices"));
        }
        Ok(topology)
    }

    pub fn tenants(&self) -> &[Tenant] {
        &self.tenants
    }

    /// Every device address in topology order.
    pub fn addresses(&self) -> Vec<DeviceAddress> {
        let mut out = Vec::new();
        for (t, tenant) in self.tenants.iter().enumerate() {
            for (p, property) in tenant.properties.iter().enumerate() {
                for d in 0..property.devices.len() {
                    out.push(DeviceAddress {
                        tenant: t,
                        property: p,
                        device: d,
                    });
                }
            }
        }
        out
    }

    pub fn resolve(&self, address: DeviceAddress) -> Option<DeviceRef<'_>> {
        let tenant = self.tenants.get(address.tenant)?;
        let property = tenant.properties.get(address.property)?;
        let device = property.devices.get(address.device)?;
        Some(DeviceRef {
            tenant,
            property,
            device,
        })
    }

    pub fn device_count(&self) -> usize {
        self.tenants
            .iter()
            .flat_map(|t| t.properties.iter())
            .map(|p| p.devices.len())
            .sum()
    }
}

fn require_id(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(GeneratorError::config(format!("{kind} id must not be empty")));
    }
    Ok(())
}

fn build_device(config: &DeviceConfig) -> Result<Device> {
    let location = parse_location(&config.id, &config.location)?;
    Ok(Device {
        id: config.id.clone(),
        name: config.name.clone(),
        make: config.make.clone().unwrap_or_else(|| "Generic".to_string()),
        model: config.model.clone().unwrap_or_else(|| "Trail Camera".to_string()),
        serial_number: config.serial_number.clone(),
        location,
        boundary_id: config
            .boundary_id
            .clone()
            .unwrap_or_else(|| "bound-unknown".to_string()),
    })
}

fn parse_location(device_id: &str, raw: &[serde_json::Value]) -> Result<GeoPoint> {
    let coords: Vec<f64> = raw.iter().filter_map(|v| v.as_f64()).collect();
    if raw.len() != 2 || coords.len() != 2 {
        return Err(GeneratorError::config(format!(
            "device '{device_id}': location must be a [longitude, latitude] pair of numbers"
        )));
    }

    let (lon, lat) = (coords[0], coords[1]);
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(GeneratorError::config(format!(
            "device '{device_id}': location [{lon}, {lat}] out of range"
        )));
    }

    Ok(GeoPoint { lon, lat })
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn config_with_devices(devices: &str) -> String {
        format!(
            r#"
tenants:
  - id: tenant-001
    name: Tenant
    properties:
      - id: prop-001
        name: Ranch
        timezone: America/Chicago
        devices:
{devices}
"#
        )
    }

    fn load(doc: &str) -> Result<Topology> {
        let config = GeneratorConfig::from_str(doc, FileFormat::Yaml)?;
        Topology::load(&config)
    }

    #[test]
    fn test_loads_devices_with_defaults() {
        let topology = load(&config_with_devices(
            "          - id: d1\n            name: Cam\n            location: [-99.6, 30.9]",
        ))
        .unwrap();

        assert_eq!(topology.device_count(), 1);
        let addr = topology.addresses()[0];
        let dev = topology.resolve(addr).unwrap();
        assert_eq!(dev.tenant.id, "tenant-001");
        assert_eq!(dev.property.timezone, chrono_tz::America::Chicago);
        assert_eq!(dev.device.make, "Generic");
        assert_eq!(dev.device.boundary_id, "bound-unknown");
        assert_eq!(dev.device.location, GeoPoint { lon: -99.6, lat: 30.9 });
    }

    #[test]
    fn test_duplicate_device_id_rejected() {
        let err = load(&config_with_devices(
            "          - id: d1\n            name: A\n            location: [0, 0]\n          - id: d1\n            name: B\n            location: [1, 1]",
        ))
        .unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(ref m) if m.contains("duplicate device id")));
    }

    #[test]
    fn test_same_device_id_in_different_properties_allowed() {
        let doc = r#"
tenants:
  - id: t1
    name: T
    properties:
      - id: p1
        name: P1
        devices:
          - { id: cam, name: A, location: [0, 0] }
      - id: p2
        name: P2
        devices:
          - { id: cam, name: B, location: [1, 1] }
"#;
        assert_eq!(load(doc).unwrap().device_count(), 2);
    }

    #[test]
    fn test_bad_location_rejected() {
        for location in ["[-99.6]", "[1, 2, 3]", "[\"east\", 30]", "[200, 10]", "[10, -95]"] {
            let err = load(&config_with_devices(&format!(
                "          - id: d1\n            name: Cam\n            location: {location}"
            )))
            .unwrap_err();
            assert!(
                matches!(err, GeneratorError::Configuration(_)),
                "location {location} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let doc = config_with_devices("          - id: d1\n            name: Cam\n            location: [0, 0]")
            .replace("America/Chicago", "Mars/Olympus_Mons");
        let err = load(&doc).unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(ref m) if m.contains("timezone")));
    }

    #[test]
    fn test_empty_topology_rejected() {
        let doc = "tenants:\n  - id: t1\n    name: T\n";
        assert!(matches!(load(doc), Err(GeneratorError::Configuration(_))));
    }
}
