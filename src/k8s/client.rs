//! Cluster client factory
//!
//! Resolves where to talk to and how to authenticate, in this order:
//! a local kubeconfig file, in-pod service account credentials, then
//! explicit connection settings from the environment or caller secrets.

use std::path::PathBuf;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::ConnectionSettings;
use crate::error::{AppError, AppResult};

const EXPLICIT_CONTEXT: &str = "chaosk8s";

/// Wrapper around kube::Client built from [`ConnectionSettings`]
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Build a client following the layered resolution order
    #[instrument(skip_all)]
    pub async fn connect(settings: &ConnectionSettings) -> AppResult<Self> {
        let config = resolve_config(settings).await?;
        let client = Client::try_from(config)?;
        Ok(Self { client })
    }

    /// Get the inner kube Client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Check the API server answers; returns its git version
    pub async fn health_check(&self) -> AppResult<String> {
        let version = self.client.apiserver_version().await?;
        Ok(version.git_version)
    }
}

/// Path of the local kubeconfig file to try first
pub fn kubeconfig_path(settings: &ConnectionSettings) -> Option<PathBuf> {
    if let Some(path) = &settings.kubeconfig {
        return Some(expand_home(path));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube").join("config"))
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

async fn resolve_config(settings: &ConnectionSettings) -> AppResult<Config> {
    let options = KubeConfigOptions {
        context: settings.context.clone(),
        ..Default::default()
    };

    if let Some(path) = kubeconfig_path(settings).filter(|p| p.exists()) {
        info!(path = %path.display(), context = ?settings.context, "Using local kubeconfig");
        let kubeconfig = Kubeconfig::read_from(&path)?;
        return Ok(Config::from_custom_kubeconfig(kubeconfig, &options).await?);
    }

    if settings.in_pod {
        info!("Using in-cluster service account credentials");
        return Ok(Config::incluster()?);
    }

    info!(host = %settings.host, "Using explicit connection settings");
    if let Some(no_proxy) = &settings.no_proxy {
        warn!(no_proxy = %no_proxy, "NO_PROXY is not honoured per host by the cluster client");
    }
    let kubeconfig: Kubeconfig = serde_json::from_value(explicit_kubeconfig(settings)?)?;
    let explicit = KubeConfigOptions {
        context: Some(EXPLICIT_CONTEXT.to_string()),
        ..Default::default()
    };
    Ok(Config::from_custom_kubeconfig(kubeconfig, &explicit).await?)
}

/// Render explicit settings as a single-context kubeconfig document so the
/// client library handles certificate and credential loading.
pub fn explicit_kubeconfig(settings: &ConnectionSettings) -> AppResult<Value> {
    let mut cluster = json!({
        "server": settings.host,
        "insecure-skip-tls-verify": !settings.verify_ssl,
    });
    if let Some(ca) = &settings.ca_cert_file {
        cluster["certificate-authority"] = json!(ca);
    }
    if let Some(proxy) = &settings.proxy_url {
        cluster["proxy-url"] = json!(proxy);
    }

    let mut user = json!({});
    if let Some(token) = &settings.api_key {
        if !settings.api_key_prefix.eq_ignore_ascii_case("bearer") {
            return Err(AppError::Configuration(format!(
                "unsupported API key prefix '{}', only Bearer tokens are accepted",
                settings.api_key_prefix
            )));
        }
        debug!("Authenticating with bearer token");
        user["token"] = json!(token);
    } else if let (Some(cert), Some(key)) = (&settings.cert_file, &settings.key_file) {
        debug!("Authenticating with client certificate");
        user["client-certificate"] = json!(cert);
        user["client-key"] = json!(key);
    } else if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
        debug!("Authenticating with basic credentials");
        user["username"] = json!(username);
        user["password"] = json!(password);
    }

    Ok(json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": EXPLICIT_CONTEXT, "cluster": cluster }],
        "users": [{ "name": EXPLICIT_CONTEXT, "user": user }],
        "contexts": [{
            "name": EXPLICIT_CONTEXT,
            "context": { "cluster": EXPLICIT_CONTEXT, "user": EXPLICIT_CONTEXT }
        }],
        "current-context": EXPLICIT_CONTEXT,
    }))
}
