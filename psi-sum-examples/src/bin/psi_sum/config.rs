//! Run configuration for the `psi_sum` binary.
//!
//! A TOML file carries the protocol parameters, the logging level, and both
//! parties' datasets. Holding both datasets in one file only makes sense for
//! local runs and testing; a deployment would give each party its own input.

use psi_sum_protocol::ProtocolConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Parameter sizes and retry policy
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Receiver's identifiers
    #[serde(default)]
    pub receiver: ReceiverConfig,

    /// Sender's records
    #[serde(default)]
    pub sender: SenderConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderConfig {
    #[serde(default)]
    pub records: Vec<RecordConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    pub id: String,
    pub value: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl RunConfig {
    /// The reference dataset: receiver {u1..u4}, sender {u1, u2, u3, u5}.
    pub fn demo() -> Self {
        let records = [("u1", 10), ("u2", 20), ("u3", 30), ("u5", 40)]
            .into_iter()
            .map(|(id, value)| RecordConfig {
                id: id.to_string(),
                value,
            })
            .collect();

        Self {
            receiver: ReceiverConfig {
                identifiers: ["u1", "u2", "u3", "u4"].map(String::from).to_vec(),
            },
            sender: SenderConfig { records },
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: RunConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        config
            .protocol
            .validate()
            .map_err(|e| format!("Invalid config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Receiver identifiers as raw bytes.
    pub fn receiver_identifiers(&self) -> Vec<Vec<u8>> {
        self.receiver
            .identifiers
            .iter()
            .map(|id| id.as_bytes().to_vec())
            .collect()
    }

    /// Sender records as raw bytes and values.
    pub fn sender_records(&self) -> Vec<(Vec<u8>, u64)> {
        self.sender
            .records
            .iter()
            .map(|record| (record.id.as_bytes().to_vec(), record.value))
            .collect()
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        let protocol = ProtocolConfig::default();
        format!(
            r#"# PSI-Sum run configuration
#
# Both datasets live in this file for local runs. The receiver learns how
# many of its identifiers the sender holds; the sender learns the sum of its
# values over those identifiers.

[protocol]
# Bit length of the blinding group modulus
group_bits = {group_bits}

# Bit length of each Paillier prime. The modulus (about twice this size)
# must exceed the largest possible intersection sum.
paillier_prime_bits = {paillier_prime_bits}

# Fresh group moduli to try before giving up
max_setup_attempts = {max_setup_attempts}

[logging]
# trace, debug, info, warn, error (RUST_LOG overrides)
level = "{level}"

[receiver]
identifiers = ["u1", "u2", "u3", "u4"]

[sender]
records = [
    {{ id = "u1", value = 10 }},
    {{ id = "u2", value = 20 }},
    {{ id = "u3", value = 30 }},
    {{ id = "u5", value = 40 }},
]
"#,
            group_bits = protocol.group_bits,
            paillier_prime_bits = protocol.paillier_prime_bits,
            max_setup_attempts = protocol.max_setup_attempts,
            level = DEFAULT_LOG_LEVEL,
        )
    }
}
