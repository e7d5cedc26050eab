use crate::cli::Args;
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::Path;
use tracing::info;

/// Creates a Kubernetes client based on provided arguments
pub async fn create_client(args: &Args) -> Result<Client> {
    info!("Creating Kubernetes client");

    if let Some(path) = &args.kubeconfig {
        return create_client_from_kubeconfig(path, args.context.as_deref()).await;
    }

    if let Some(context) = args.context.as_deref() {
        info!("Using context: {}", context);
        let config = kube::Config::from_kubeconfig(&context_options(Some(context)))
            .await
            .with_context(|| format!("Failed to load kubeconfig context {context}"))?;
        return Ok(Client::try_from(config)?);
    }

    // Default to inferred config from environment
    let client = Client::try_default()
        .await
        .context("Failed to infer Kubernetes configuration")?;
    info!("Using default Kubernetes client configuration");
    Ok(client)
}

/// Creates a client from a specific kubeconfig file
async fn create_client_from_kubeconfig(path: &Path, context: Option<&str>) -> Result<Client> {
    info!("Loading kubeconfig from: {:?}", path);

    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &context_options(context)).await?;
    Ok(Client::try_from(client_config)?)
}

fn context_options(context: Option<&str>) -> KubeConfigOptions {
    KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    }
}
