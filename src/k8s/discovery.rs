use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use tracing::{debug, info};

use crate::config::DiscoveryConfig;

/// Finds the Prometheus HTTP address from its in-cluster service
pub async fn discover_prometheus(client: &Client, discovery: &DiscoveryConfig) -> Result<String> {
    let DiscoveryConfig {
        namespace,
        service,
        port_name,
    } = discovery;
    debug!("Looking up service {}/{}", namespace, service);

    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let svc = services
        .get(service)
        .await
        .with_context(|| format!("Failed to get service {namespace}/{service}"))?;

    let address = service_address(&svc, port_name)
        .ok_or_else(|| anyhow!("Service {namespace}/{service} exposes no ports"))?;
    info!("Discovered Prometheus at {}", address);
    Ok(address)
}

/// Address of a service: its cluster IP, or the cluster DNS name for headless
/// services, with the port named `port_name` or else the first port.
pub fn service_address(service: &Service, port_name: &str) -> Option<String> {
    let spec = service.spec.as_ref()?;
    let ports = spec.ports.as_ref()?;
    let port = ports
        .iter()
        .find(|p| p.name.as_deref() == Some(port_name))
        .or_else(|| ports.first())?;

    let host = match spec.cluster_ip.as_deref() {
        Some(ip) if !ip.is_empty() && ip != "None" => {
            if ip.contains(':') {
                format!("[{ip}]")
            } else {
                ip.to_string()
            }
        }
        _ => {
            let name = service.metadata.name.as_deref()?;
            let namespace = service.metadata.namespace.as_deref().unwrap_or("default");
            format!("{name}.{namespace}.svc")
        }
    };

    Some(format!("http://{host}:{}", port.port))
}
