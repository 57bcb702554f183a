//! Translation between cloudscale servers and Machine records

use crate::error::ControllerError;
use cloudscale_client::{AddressRequest, InterfaceRequest, Server};
use crds::{
    CloudscaleMachineProviderStatus, InterfaceSpec, InterfaceType, Machine, MachineAddress, MachineAddressType,
    provider_status_to_raw,
};

pub const INSTANCE_TYPE_LABEL: &str = "machine.openshift.io/instance-type";
pub const REGION_LABEL: &str = "machine.openshift.io/region";
pub const ZONE_LABEL: &str = "machine.openshift.io/zone";

const PROVIDER_ID_PREFIX: &str = "cloudscale://";
const PUBLIC_NETWORK: &str = "public";

pub fn provider_id(server_uuid: &str) -> String {
    format!("{}{}", PROVIDER_ID_PREFIX, server_uuid)
}

/// Region of a zone slug: `rma1` -> `rma`
pub fn region_from_zone(zone: &str) -> &str {
    zone.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Record the observed server on the machine
///
/// Sets the instance-type/region/zone labels, the provider ID, the
/// addresses and the provider status. Nothing else is touched.
pub fn apply_server(machine: &mut Machine, server: &Server) -> Result<(), ControllerError> {
    let labels = machine.metadata.labels.get_or_insert_with(Default::default);
    labels.insert(INSTANCE_TYPE_LABEL.to_string(), server.flavor.slug.clone());
    labels.insert(REGION_LABEL.to_string(), region_from_zone(&server.zone.slug).to_string());
    labels.insert(ZONE_LABEL.to_string(), server.zone.slug.clone());

    machine.spec.provider_id = Some(provider_id(&server.uuid));

    let provider_status = provider_status_to_raw(&CloudscaleMachineProviderStatus {
        instance_id: server.uuid.clone(),
        status: server.status.clone(),
        conditions: Vec::new(),
    })?;
    let status = machine.status.get_or_insert_with(Default::default);
    status.addresses = machine_addresses(server);
    status.provider_status = Some(provider_status);

    Ok(())
}

/// Addresses of a server as reported on the Machine
///
/// The server name is both hostname and internal DNS name. When it carries a
/// domain, the bare hostname is added as a second internal DNS name. Every
/// interface address follows, external for the public network and internal
/// otherwise.
pub fn machine_addresses(server: &Server) -> Vec<MachineAddress> {
    let mut addresses = vec![
        MachineAddress::new(MachineAddressType::Hostname, server.name.clone()),
        MachineAddress::new(MachineAddressType::InternalDns, server.name.clone()),
    ];

    let hostname = server.name.split('.').next().unwrap_or_default();
    if hostname != server.name {
        addresses.push(MachineAddress::new(MachineAddressType::InternalDns, hostname));
    }

    for iface in &server.interfaces {
        let address_type = if iface.interface_type == PUBLIC_NETWORK {
            MachineAddressType::ExternalIp
        } else {
            MachineAddressType::InternalIp
        };
        addresses.extend(
            iface
                .addresses
                .iter()
                .map(|a| MachineAddress::new(address_type, a.address.clone())),
        );
    }

    addresses
}

/// Interface attachments of a create request
///
/// An empty list leaves the provider default (a single public interface).
/// A private interface without an address list is attached with DHCP; an
/// empty list attaches it without any address.
pub fn interface_requests(interfaces: &[InterfaceSpec]) -> Option<Vec<InterfaceRequest>> {
    if interfaces.is_empty() {
        return None;
    }

    Some(
        interfaces
            .iter()
            .map(|iface| match iface.interface_type {
                InterfaceType::Public => InterfaceRequest {
                    network: PUBLIC_NETWORK.to_string(),
                    addresses: None,
                },
                InterfaceType::Private => InterfaceRequest {
                    network: iface.network_uuid.clone(),
                    addresses: iface.addresses.as_ref().map(|addresses| {
                        addresses
                            .iter()
                            .map(|a| AddressRequest {
                                subnet: a.subnet_uuid.clone(),
                                address: a.address.clone(),
                            })
                            .collect()
                    }),
                },
            })
            .collect(),
    )
}
