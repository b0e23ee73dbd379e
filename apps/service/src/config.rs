use std::{env, fmt, fs, io, path};

use nodewatch::{MonitorSettings, Node, ProtocolKind, RealertPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse configuration: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no configuration directory: set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorSettings,
    pub notifier: NotifierConfig,
    pub nodes: Vec<NodeEntry>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Alerts are POSTed here as JSON; without it they are only logged.
    pub webhook_url: Option<String>,
}

/// A monitored node and its connection material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: Option<ProtocolKind>,
    pub endpoint: String,
    #[serde(default)]
    pub interval_secs: u64,
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default)]
    pub failure_threshold: u32,
    pub tls: Option<TlsEntry>,
    pub rpc: Option<RpcEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsEntry {
    pub ca_file: path::PathBuf,
    pub client_cert_file: Option<path::PathBuf>,
    pub server_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEntry {
    pub host: String,
    pub port: u16,
}

impl NodeEntry {
    /// Registration for this entry; zero values are left for the monitor
    /// defaults.
    pub fn to_node(&self) -> Node {
        let name = if self.name.is_empty() { self.id.clone() } else { self.name.clone() };
        let mut node = Node::new(self.id.as_str(), name, self.endpoint.clone(), ProtocolKind::Unknown)
            .with_interval(Duration::from_secs(self.interval_secs))
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_failure_threshold(self.failure_threshold);
        node.kind = self.kind;
        node
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/nodewatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::var_os("HOME") {
        path::PathBuf::from(home_dir).join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("nodewatch/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        let realert = match self.monitor.realert {
            RealertPolicy::EveryCycle => "every cycle".to_string(),
            RealertPolicy::OncePerOutage => "once per outage".to_string(),
            RealertPolicy::Interval { secs } => format!("every {secs}s"),
        };

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Workers", &self.monitor.workers)?;
        write_1(f, "Tick (ms)", &self.monitor.tick_millis)?;
        write_1(f, "Default Interval (s)", &self.monitor.default_interval_secs)?;
        write_1(f, "Default Timeout (s)", &self.monitor.default_timeout_secs)?;
        write_1(f, "Default Failure Threshold", &self.monitor.default_failure_threshold)?;
        write_1(f, "Notification Deadline (s)", &self.monitor.notification_deadline_secs)?;
        write_1(f, "Re-alert", &realert)?;

        write_title_1(f, "Notifier")?;
        write_1(f, "Webhook", &self.notifier.webhook_url.as_deref().unwrap_or("(log only)"))?;

        write_title_1(f, "Nodes")?;
        for node in &self.nodes {
            let kind = node.kind.map_or_else(|| "unset".to_string(), |kind| kind.to_string());
            write_1(f, &node.id, &format_args!("{} ({})", node.endpoint, kind))?;
            if let Some(tls) = &node.tls {
                write_2(f, "CA", &tls.ca_file.display())?;
            }
            if let Some(rpc) = &node.rpc {
                write_2(f, "RPC", &format_args!("{}:{}", rpc.host, rpc.port))?;
            }
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/nodewatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[monitor]
workers = 2
default_failure_threshold = 5

[monitor.realert]
mode = "interval"
secs = 600

[notifier]
webhook_url = "https://hooks.example.com/nodewatch"

[[nodes]]
id = "orderer0"
name = "Orderer 0"
kind = "consensus"
endpoint = "orderer0.example.com:7050"
failure_threshold = 2

[nodes.tls]
ca_file = "/etc/nodewatch/orderer-ca.pem"
server_name = "orderer0.example.com"

[[nodes]]
id = "geth0"
kind = "full_node"
endpoint = "geth0.internal:8545"

[nodes.rpc]
host = "geth0.internal"
port = 8545
"#;

    #[test]
    fn test_parse_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.monitor.workers, 2);
        assert_eq!(config.monitor.default_failure_threshold, 5);
        assert_eq!(config.monitor.tick_millis, 1000);
        assert_eq!(config.monitor.realert, RealertPolicy::Interval { secs: 600 });
        assert_eq!(
            config.notifier.webhook_url.as_deref(),
            Some("https://hooks.example.com/nodewatch")
        );

        assert_eq!(config.nodes.len(), 2);
        let orderer = &config.nodes[0];
        assert_eq!(orderer.kind, Some(ProtocolKind::Consensus));
        assert_eq!(orderer.tls.as_ref().unwrap().server_name.as_deref(), Some("orderer0.example.com"));
        assert_eq!(config.nodes[1].rpc.as_ref().unwrap().port, 8545);
    }

    #[test]
    fn test_entry_to_node() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        let node = config.nodes[0].to_node();
        assert_eq!(node.id.as_str(), "orderer0");
        assert_eq!(node.failure_threshold, 2);
        assert!(node.check_interval.is_zero());

        let node = config.nodes[1].to_node();
        assert_eq!(node.name, "geth0");
        assert_eq!(node.kind, Some(ProtocolKind::FullNode));
    }

    #[test]
    fn test_missing_kind_stays_unset() {
        let config: Config = toml::from_str(
            r#"
[[nodes]]
id = "mystery"
endpoint = "mystery:1"
"#,
        )
        .unwrap();
        assert_eq!(config.nodes[0].to_node().kind, None);
    }

    #[test]
    fn test_default_config_is_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config");

        let config = Config::from_config(Some(&path)).unwrap();
        assert!(config.nodes.is_empty());
        assert!(dir.path().join("nested/config.toml").exists());

        let reloaded = Config::from_config(Some(&path)).unwrap();
        assert_eq!(reloaded.monitor, config.monitor);
    }

    #[test]
    fn test_display_lists_nodes() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let text = config.to_string();
        assert!(text.contains("orderer0.example.com:7050 (consensus)"));
        assert!(text.contains("every 600s"));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[monitor\nworkers = ").unwrap();
        assert!(matches!(Config::from_config(Some(&path)), Err(Error::ParseFailed(_))));
    }
}
