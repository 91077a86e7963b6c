//! Test configuration builder for writing config directories programmatically

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Written config directory; dropped with the temp dir
pub struct TestConfig {
    _temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestConfig {
    pub fn dir(&self) -> String {
        self.config_dir.display().to_string()
    }

    pub async fn load(&self) -> Result<monitor::Config, monitor::errors::ConfigError> {
        monitor::ConfigManager::load_configuration(&self.dir()).await
    }
}

/// Builder for creating test configurations
pub struct TestConfigBuilder {
    temp_dir: TempDir,
    main_config: MainConfigBuilder,
    validator_files: Vec<(String, Vec<ValidatorConfigBuilder>)>,
    raw_files: Vec<(String, String)>,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            main_config: MainConfigBuilder::default(),
            validator_files: Vec::new(),
            raw_files: Vec::new(),
        }
    }

    pub fn with_main_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(MainConfigBuilder) -> MainConfigBuilder,
    {
        self.main_config = f(self.main_config);
        self
    }

    /// Add a validator file containing one validator
    pub fn with_validator<F>(self, file: &str, name: &str, f: F) -> Self
    where
        F: FnOnce(ValidatorConfigBuilder) -> ValidatorConfigBuilder,
    {
        self.with_validators(file, vec![f(ValidatorConfigBuilder::new(name))])
    }

    pub fn with_validators(mut self, file: &str, validators: Vec<ValidatorConfigBuilder>) -> Self {
        match self.validator_files.iter_mut().find(|(f, _)| f == file) {
            Some((_, existing)) => existing.extend(validators),
            None => self.validator_files.push((file.to_string(), validators)),
        }
        self
    }

    /// Write a file verbatim, e.g. secrets.toml
    pub fn with_raw_file(mut self, file: &str, content: &str) -> Self {
        self.raw_files.push((file.to_string(), content.to_string()));
        self
    }

    pub fn build(self) -> TestConfig {
        let config_dir = self.temp_dir.path().join("config");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        fs::write(config_dir.join("main.toml"), self.main_config.to_toml())
            .expect("Failed to write main.toml");

        for (file, validators) in &self.validator_files {
            let content: String = validators.iter().map(|v| v.to_toml()).collect();
            fs::write(config_dir.join(file), content).expect("Failed to write validator config");
        }

        for (file, content) in &self.raw_files {
            fs::write(config_dir.join(file), content).expect("Failed to write raw config");
        }

        TestConfig {
            _temp_dir: self.temp_dir,
            config_dir,
        }
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Main configuration builder
#[derive(Clone)]
pub struct MainConfigBuilder {
    port: u16,
    check_interval_seconds: u64,
    probe_timeout_seconds: u64,
    alert_threshold: u32,
    telegram: String,
    providers_enabled: bool,
    extra: Vec<String>,
}

impl MainConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn check_interval(mut self, seconds: u64) -> Self {
        self.check_interval_seconds = seconds;
        self
    }

    pub fn probe_timeout(mut self, seconds: u64) -> Self {
        self.probe_timeout_seconds = seconds;
        self
    }

    pub fn alert_threshold(mut self, threshold: u32) -> Self {
        self.alert_threshold = threshold;
        self
    }

    /// Enable the primary channel against a mock Telegram API
    pub fn telegram(mut self, api_url: &str) -> Self {
        self.telegram = format!(
            "[telegram]\nenabled = true\ntoken = \"test-token\"\nchat_id = \"-1001\"\napi_url = \"{}\"\n",
            api_url
        );
        self
    }

    /// Leave the third-party uptime providers at their defaults
    pub fn with_providers(mut self) -> Self {
        self.providers_enabled = true;
        self
    }

    /// Append raw TOML (tables such as `[thresholds]` or `[pushover]`)
    pub fn extra(mut self, toml: &str) -> Self {
        self.extra.push(toml.to_string());
        self
    }

    fn to_toml(&self) -> String {
        let mut toml = format!(
            r#"
host = "127.0.0.1"
port = {}
check_interval_seconds = {}
probe_timeout_seconds = {}
alert_threshold = {}
"#,
            self.port, self.check_interval_seconds, self.probe_timeout_seconds, self.alert_threshold
        );
        toml.push_str(&self.telegram);
        if !self.providers_enabled {
            toml.push_str("\n[huginn]\nenabled = false\n\n[gmonads]\nenabled = false\n");
        }
        for extra in &self.extra {
            toml.push_str(extra);
            toml.push('\n');
        }
        toml
    }
}

impl Default for MainConfigBuilder {
    fn default() -> Self {
        Self {
            port: 8181,
            check_interval_seconds: 60,
            probe_timeout_seconds: 10,
            alert_threshold: 3,
            telegram: "[telegram]\nenabled = false\n".to_string(),
            providers_enabled: false,
            extra: Vec::new(),
        }
    }
}

/// Validator configuration builder
#[derive(Clone)]
pub struct ValidatorConfigBuilder {
    name: String,
    host: String,
    network: String,
    metrics_port: u16,
    rpc_port: u16,
    node_exporter_port: Option<u16>,
    validator_secp: String,
    enabled: bool,
}

impl ValidatorConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host: "127.0.0.1".to_string(),
            network: "testnet".to_string(),
            metrics_port: 8889,
            rpc_port: 8080,
            node_exporter_port: None,
            validator_secp: super::test_data::keys::VALIDATOR_1.to_string(),
            enabled: true,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn network(mut self, network: &str) -> Self {
        self.network = network.to_string();
        self
    }

    pub fn metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = port;
        self
    }

    pub fn rpc_port(mut self, port: u16) -> Self {
        self.rpc_port = port;
        self
    }

    pub fn node_exporter_port(mut self, port: u16) -> Self {
        self.node_exporter_port = Some(port);
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.validator_secp = key.to_string();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn to_toml(&self) -> String {
        let mut toml = format!(
            r#"
[validators.{}]
host = "{}"
network = "{}"
metrics_port = {}
rpc_port = {}
validator_secp = "{}"
enabled = {}
"#,
            self.name,
            self.host,
            self.network,
            self.metrics_port,
            self.rpc_port,
            self.validator_secp,
            self.enabled
        );
        if let Some(port) = self.node_exporter_port {
            toml.push_str(&format!("node_exporter_port = {}\n", port));
        }
        toml
    }
}
