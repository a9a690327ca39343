use crate::endpoint::EndpointConfig;
use crate::error::{Result, TsflowError};
use crate::format::ts::types::PID_FIRST_PROGRAM;
use crate::format::ts::{MuxerConfig, ServiceDescriptor, ServiceType, PID_DEDICATED_PCR, PID_PMT, PID_SDT};
use crate::streamer::StreamerConfig;
use lazy_static::lazy_static;
use log::warn;
use parking_lot::RwLock;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Files read in order; later files override earlier ones.
pub const CONFIG_PATHS: [&str; 2] = ["./tsflow.toml", "./tsflow_config.toml"];

/// Prefix of the environment variables overriding file settings.
pub const ENV_PREFIX: &str = "TSFLOW_";

lazy_static! {
    static ref SETTINGS: RwLock<Settings> = RwLock::new(Settings::load_or_default());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub service_id: u16,
    pub provider_name: String,
    pub service_name: String,
    pub service_type: ServiceType,
    pub transport_stream_id: u16,
    pub pmt_pid: u16,
    pub psi_interval: Duration,
    pub pcr_interval: Duration,
    pub emit_sdt: bool,
    pub queue_capacity: usize,
    pub write_timeout: Duration,
    pub drain_timeout: Duration,
    /// `file://`, `tcp://` or `udp://` URL of the output.
    pub endpoint: Option<String>,
}

/// Keys a settings file may carry. Durations are in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    service_id: Option<u16>,
    provider_name: Option<String>,
    service_name: Option<String>,
    service_type: Option<u8>,
    transport_stream_id: Option<u16>,
    pmt_pid: Option<u16>,
    psi_interval_ms: Option<u64>,
    pcr_interval_ms: Option<u64>,
    emit_sdt: Option<bool>,
    queue_capacity: Option<usize>,
    write_timeout_ms: Option<u64>,
    drain_timeout_ms: Option<u64>,
    endpoint: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_id: 0x4698,
            provider_name: String::from("tsflow"),
            service_name: String::from("tsflow live"),
            service_type: ServiceType::DigitalTv,
            transport_stream_id: 1,
            pmt_pid: PID_PMT,
            psi_interval: Duration::from_millis(100),
            pcr_interval: Duration::from_millis(40),
            emit_sdt: false,
            queue_capacity: 64,
            write_timeout: Duration::from_secs(2),
            drain_timeout: Duration::from_millis(500),
            endpoint: None,
        }
    }
}

impl Settings {
    /// Defaults, then the config files, then `TSFLOW_*` environment variables.
    pub fn from_sources() -> Result<Self> {
        let mut settings = Settings::default();
        for path in &CONFIG_PATHS {
            if let Ok(content) = fs::read_to_string(path) {
                settings.apply_file(&content)?;
            }
        }
        settings.apply_vars(env::vars())?;
        settings.validate()?;
        Ok(settings)
    }

    fn load_or_default() -> Self {
        match Settings::from_sources() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Invalid tsflow settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    /// Applies a TOML settings file. Unknown keys are rejected.
    pub fn apply_file(&mut self, content: &str) -> Result<()> {
        let file: SettingsFile = toml::from_str(content)?;
        if let Some(id) = file.service_id {
            self.service_id = id;
        }
        if let Some(name) = file.provider_name {
            self.provider_name = name;
        }
        if let Some(name) = file.service_name {
            self.service_name = name;
        }
        if let Some(service_type) = file.service_type {
            self.service_type = ServiceType::try_from(service_type)?;
        }
        if let Some(id) = file.transport_stream_id {
            self.transport_stream_id = id;
        }
        if let Some(pid) = file.pmt_pid {
            self.pmt_pid = pid;
        }
        if let Some(ms) = file.psi_interval_ms {
            self.psi_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.pcr_interval_ms {
            self.pcr_interval = Duration::from_millis(ms);
        }
        if let Some(emit_sdt) = file.emit_sdt {
            self.emit_sdt = emit_sdt;
        }
        if let Some(capacity) = file.queue_capacity {
            self.queue_capacity = capacity;
        }
        if let Some(ms) = file.write_timeout_ms {
            self.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.drain_timeout_ms {
            self.drain_timeout = Duration::from_millis(ms);
        }
        if let Some(endpoint) = file.endpoint {
            self.endpoint = Some(endpoint).filter(|url| !url.is_empty());
        }
        Ok(())
    }

    /// Applies every `TSFLOW_<KEY>` pair; other variables are skipped.
    pub fn apply_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                self.set(&key.to_ascii_lowercase(), value.trim())?;
            }
        }
        Ok(())
    }

    /// Sets one setting by key. Returns `false` for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "service_id" => self.service_id = parse_u16(value)?,
            "provider_name" => self.provider_name = value.to_string(),
            "service_name" => self.service_name = value.to_string(),
            "service_type" => self.service_type = ServiceType::try_from(parse_u8(key, value)?)?,
            "transport_stream_id" => self.transport_stream_id = parse_u16(value)?,
            "pmt_pid" => self.pmt_pid = parse_u16(value)?,
            "psi_interval_ms" => self.psi_interval = parse_millis(value)?,
            "pcr_interval_ms" => self.pcr_interval = parse_millis(value)?,
            "emit_sdt" => self.emit_sdt = parse_bool(key, value)?,
            "queue_capacity" => self.queue_capacity = value.parse()?,
            "write_timeout_ms" => self.write_timeout = parse_millis(value)?,
            "drain_timeout_ms" => self.drain_timeout = parse_millis(value)?,
            "endpoint" => {
                self.endpoint = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        if self.psi_interval.is_zero() || self.pcr_interval.is_zero() {
            return Err(TsflowError::Configuration(
                "PSI and PCR intervals must be positive".into(),
            ));
        }
        if self.pcr_interval > Duration::from_millis(100) {
            warn!(
                "PCR interval {:?} exceeds the 100 ms decoders expect",
                self.pcr_interval
            );
        }
        if self.queue_capacity == 0 {
            return Err(TsflowError::Configuration(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if !(PID_FIRST_PROGRAM..PID_DEDICATED_PCR).contains(&self.pmt_pid)
            || (self.emit_sdt && self.pmt_pid == PID_SDT)
        {
            return Err(TsflowError::Configuration(format!(
                "PMT PID 0x{:04x} is reserved",
                self.pmt_pid
            )));
        }
        self.endpoint_config()?;
        Ok(())
    }

    pub fn service_descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(
            self.service_id,
            self.service_type,
            &self.provider_name,
            &self.service_name,
        )
    }

    pub fn muxer_config(&self) -> MuxerConfig {
        MuxerConfig {
            transport_stream_id: self.transport_stream_id,
            pmt_pid: self.pmt_pid,
            psi_interval: self.psi_interval,
            pcr_interval: self.pcr_interval,
            emit_sdt: self.emit_sdt,
        }
    }

    pub fn streamer_config(&self) -> StreamerConfig {
        StreamerConfig {
            service: self.service_descriptor(),
            muxer: self.muxer_config(),
            queue_capacity: self.queue_capacity,
            write_timeout: self.write_timeout,
            drain_timeout: self.drain_timeout,
        }
    }

    pub fn endpoint_config(&self) -> Result<Option<EndpointConfig>> {
        self.endpoint
            .as_deref()
            .map(EndpointConfig::parse)
            .transpose()
    }
}

fn parse_u16(value: &str) -> Result<u16> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => Ok(u16::from_str_radix(hex, 16)?),
        None => Ok(value.parse()?),
    }
}

fn parse_u8(key: &str, value: &str) -> Result<u8> {
    u8::try_from(parse_u16(value)?).map_err(|_| {
        TsflowError::Configuration(format!("{} expects a byte, got '{}'", key, value))
    })
}

fn parse_millis(value: &str) -> Result<Duration> {
    Ok(Duration::from_millis(value.parse()?))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(TsflowError::Configuration(format!(
            "{} expects a boolean, got '{}'",
            key, value
        ))),
    }
}

/// Snapshot of the process-wide settings.
pub fn settings() -> Settings {
    SETTINGS.read().clone()
}

/// Re-reads files and environment. The previous settings stay on error.
pub fn reload() -> Result<()> {
    let settings = Settings::from_sources()?;
    *SETTINGS.write() = settings;
    Ok(())
}

/// Creates a settings template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# tsflow configuration
# Every key can also be set through a TSFLOW_<KEY> environment variable.

service_id = 0x4698
provider_name = "tsflow"
service_name = "tsflow live"
psi_interval_ms = 100
pcr_interval_ms = 40
emit_sdt = false

# endpoint = "udp://127.0.0.1:9000"
"#;
        fs::write(path, template)?;
    }
    Ok(())
}
