use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use eyre::WrapErr;
use serde::{Serialize, Deserialize};

/// How the keypad gets scanned.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Scan once every time the keypad channel raises an interrupt.
    #[default]
    Interrupt,
    /// Scan every `poll_interval_ms`, without interrupts.
    Poll,
}

#[derive(Serialize, Deserialize, Debug, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    /// UIO device exposing the AXI GPIO registers.
    pub device: String,
    /// UIO device delivering the interrupt. Defaults to `device`.
    pub interrupt_device: Option<String>,
    pub mode: ScanMode,
    /// Interrupt source identifier the keypad handler is connected to.
    pub interrupt_id: u32,
    pub keypad_channel: u8,
    pub led_channel: u8,
    pub poll_interval_ms: u64,
    /// Re-enable the keypad interrupt after a spurious one instead of leaving it disabled.
    pub rearm_on_spurious: bool,
}

impl Config {
    const DEFAULT_FILE: &'static str = "keyscan.json";

    /// Gets the config file path, from `CONFIG_FILE` or the default.
    pub fn path() -> PathBuf {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new(Self::DEFAULT_FILE));
        PathBuf::from(config_str)
    }

    /// Loads the config at `config_path`.
    ///
    /// Returns `Ok(None)` only if the file does not exist. A file that can't be read or parsed is an error.
    pub fn try_load(config_path: &Path) -> eyre::Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)?;
        let reader = std::io::BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .wrap_err_with(|| format!("Invalid config file {}", config_path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self, config_path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn interrupt_device(&self) -> &str {
        self.interrupt_device.as_deref().unwrap_or(&self.device)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: "/dev/uio0".to_string(),
            interrupt_device: None,
            mode: ScanMode::default(),
            interrupt_id: 61,
            keypad_channel: 2,
            led_channel: 1,
            poll_interval_ms: 50,
            rearm_on_spurious: false,
        }
    }
}
