use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;

/// Process configuration, read from the environment (and an optional `.env`).
///
/// Field names follow the environment variable names they are read from, so
/// `KUBERNETES_HOST` lands in `kubernetes_host`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_kubeconfig")]
    pub kubeconfig: Option<String>,

    #[serde(default)]
    pub kubernetes_context: Option<String>,

    #[serde(default)]
    pub chaostoolkit_in_pod: Option<String>,

    #[serde(default)]
    pub kubernetes_host: Option<String>,

    #[serde(default)]
    pub kubernetes_verify_ssl: Option<String>,

    #[serde(default)]
    pub kubernetes_ca_cert_file: Option<String>,

    #[serde(default)]
    pub kubernetes_api_key: Option<String>,

    #[serde(default)]
    pub kubernetes_api_key_prefix: Option<String>,

    #[serde(default)]
    pub kubernetes_cert_file: Option<String>,

    #[serde(default)]
    pub kubernetes_key_file: Option<String>,

    #[serde(default)]
    pub kubernetes_username: Option<String>,

    #[serde(default)]
    pub kubernetes_password: Option<String>,

    #[serde(default)]
    pub http_proxy: Option<String>,

    #[serde(default)]
    pub no_proxy: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_kubeconfig() -> Option<String> {
    None
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let settings: Config = config
            .try_deserialize()
            .unwrap_or_else(|_| Config::default());

        Ok(settings)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            kubeconfig: default_kubeconfig(),
            kubernetes_context: None,
            chaostoolkit_in_pod: None,
            kubernetes_host: None,
            kubernetes_verify_ssl: None,
            kubernetes_ca_cert_file: None,
            kubernetes_api_key: None,
            kubernetes_api_key_prefix: None,
            kubernetes_cert_file: None,
            kubernetes_key_file: None,
            kubernetes_username: None,
            kubernetes_password: None,
            http_proxy: None,
            no_proxy: None,
        }
    }
}

/// Per-call secrets handed over by the experiment runner, keyed by the same
/// names as the environment variables (`KUBERNETES_HOST`, ...).
pub type Secrets = BTreeMap<String, String>;

/// Everything needed to build one cluster client.
///
/// Built fresh for every activity run from the process [`Config`] with the
/// caller's secrets layered on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSettings {
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    pub in_pod: bool,
    pub host: String,
    pub verify_ssl: bool,
    pub ca_cert_file: Option<String>,
    pub api_key: Option<String>,
    pub api_key_prefix: String,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub proxy_url: Option<String>,
    pub no_proxy: Option<String>,
}

impl ConnectionSettings {
    pub fn resolve(config: &Config, secrets: &Secrets) -> Self {
        let lookup = |key: &str, fallback: &Option<String>| -> Option<String> {
            secrets
                .get(key)
                .cloned()
                .or_else(|| fallback.clone())
                .filter(|v| !v.is_empty())
        };

        Self {
            kubeconfig: lookup("KUBECONFIG", &config.kubeconfig),
            context: lookup("KUBERNETES_CONTEXT", &config.kubernetes_context),
            in_pod: lookup("CHAOSTOOLKIT_IN_POD", &config.chaostoolkit_in_pod).as_deref()
                == Some("true"),
            host: lookup("KUBERNETES_HOST", &config.kubernetes_host)
                .unwrap_or_else(|| "http://localhost".to_string()),
            verify_ssl: lookup("KUBERNETES_VERIFY_SSL", &config.kubernetes_verify_ssl)
                .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
            ca_cert_file: lookup("KUBERNETES_CA_CERT_FILE", &config.kubernetes_ca_cert_file),
            api_key: lookup("KUBERNETES_API_KEY", &config.kubernetes_api_key),
            api_key_prefix: lookup(
                "KUBERNETES_API_KEY_PREFIX",
                &config.kubernetes_api_key_prefix,
            )
            .unwrap_or_else(|| "Bearer".to_string()),
            cert_file: lookup("KUBERNETES_CERT_FILE", &config.kubernetes_cert_file),
            key_file: lookup("KUBERNETES_KEY_FILE", &config.kubernetes_key_file),
            username: lookup("KUBERNETES_USERNAME", &config.kubernetes_username),
            password: lookup("KUBERNETES_PASSWORD", &config.kubernetes_password),
            proxy_url: lookup("HTTP_PROXY", &config.http_proxy),
            no_proxy: lookup("NO_PROXY", &config.no_proxy),
        }
    }
}
