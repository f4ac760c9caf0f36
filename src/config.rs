//! Process Configuration
//!
//! Everything a process needs to join the cache: the application name that addresses
//! the shared channel, the role it plays and the participant-side tuning. The role is
//! always passed in explicitly; nothing below this layer inspects process state.

use crate::protocol::types::CacheValue;

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Name under which the coordinator issues its own requests.
pub const COORDINATOR_NAME: &str = "master";
/// Environment variable naming a participant when `--name` is not given.
pub const NAME_ENV_VAR: &str = "CLUSTER_CACHE_NAME";
pub const DEFAULT_SOCKET_ROOT: &str = "/tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Participant,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub app_name: String,
    pub participant_name: String,
    pub role: Role,
    pub socket_root: PathBuf,
    pub request_timeout: Duration,
    /// Only warnings and errors are logged.
    pub silent: bool,
}

/// What the binary should do once the cache is up.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Serve,
    Set { key: String, value: CacheValue },
    Get { key: String },
}

impl CacheConfig {
    pub fn new(app_name: &str, role: Role) -> Self {
        Self {
            app_name: app_name.to_string(),
            participant_name: default_participant_name(),
            role,
            socket_root: PathBuf::from(DEFAULT_SOCKET_ROOT),
            request_timeout: Duration::from_secs(5),
            silent: false,
        }
    }

    pub fn with_socket_root(mut self, socket_root: impl Into<PathBuf>) -> Self {
        self.socket_root = socket_root.into();
        self
    }

    pub fn with_participant_name(mut self, name: &str) -> Self {
        self.participant_name = name.to_string();
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn is_coordinator(&self) -> bool {
        self.role == Role::Coordinator
    }

    /// Socket the coordinator listens on: `<socket_root>/app.<app_name>`.
    pub fn socket_path(&self) -> PathBuf {
        self.socket_root.join(format!("app.{}", self.app_name))
    }

    /// Name stamped on outgoing requests.
    pub fn process_name(&self) -> &str {
        match self.role {
            Role::Coordinator => COORDINATOR_NAME,
            Role::Participant => &self.participant_name,
        }
    }

    /// Parses command-line arguments (without the program name).
    ///
    /// ```text
    /// --app <name> --coordinator [--socket-root <dir>] [--silent]
    /// --app <name> [--name <participant>] [--timeout-ms <ms>] set <key> <value>
    /// --app <name> [--name <participant>] [--timeout-ms <ms>] get <key>
    /// ```
    pub fn from_args(args: &[String]) -> Result<(Self, Command)> {
        let mut app_name: Option<String> = None;
        let mut role = Role::Participant;
        let mut name: Option<String> = None;
        let mut socket_root: Option<PathBuf> = None;
        let mut timeout_ms: Option<u64> = None;
        let mut silent = false;
        let mut positional: Vec<String> = vec![];

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--app" => {
                    app_name = Some(flag_value(args, i)?.to_string());
                    i += 2;
                }
                "--name" => {
                    name = Some(flag_value(args, i)?.to_string());
                    i += 2;
                }
                "--socket-root" => {
                    socket_root = Some(PathBuf::from(flag_value(args, i)?));
                    i += 2;
                }
                "--timeout-ms" => {
                    timeout_ms = Some(flag_value(args, i)?.parse()?);
                    i += 2;
                }
                "--coordinator" => {
                    role = Role::Coordinator;
                    i += 1;
                }
                "--silent" => {
                    silent = true;
                    i += 1;
                }
                other => {
                    positional.push(other.to_string());
                    i += 1;
                }
            }
        }

        let app_name = app_name.ok_or_else(|| anyhow::anyhow!("--app is required"))?;
        if app_name.is_empty() {
            anyhow::bail!("--app must not be empty");
        }

        let command = match (role, positional.as_slice()) {
            (Role::Coordinator, []) => Command::Serve,
            (Role::Coordinator, rest) => {
                anyhow::bail!("the coordinator takes no command, got {:?}", rest)
            }
            (Role::Participant, [op, key, value]) if op.as_str() == "set" => Command::Set {
                key: key.clone(),
                value: CacheValue::parse_lenient(value),
            },
            (Role::Participant, [op, key]) if op.as_str() == "get" => {
                Command::Get { key: key.clone() }
            }
            (Role::Participant, rest) => {
                anyhow::bail!("expected `set <key> <value>` or `get <key>`, got {:?}", rest)
            }
        };

        let mut config = CacheConfig::new(&app_name, role);
        if let Some(name) = name {
            config.participant_name = name;
        }
        if let Some(root) = socket_root {
            config.socket_root = root;
        }
        if let Some(ms) = timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        config.silent = silent;

        Ok((config, command))
    }
}

fn flag_value(args: &[String], i: usize) -> Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} expects a value", args[i]))
}

fn default_participant_name() -> String {
    std::env::var(NAME_ENV_VAR)
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("participant-{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_coordinator_args() {
        let (config, command) =
            CacheConfig::from_args(&args("--app shop --coordinator --silent")).unwrap();

        assert_eq!(config.role, Role::Coordinator);
        assert_eq!(config.process_name(), COORDINATOR_NAME);
        assert!(config.silent);
        assert_eq!(command, Command::Serve);
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/app.shop"));
    }

    #[test]
    fn test_participant_set_args() {
        let (config, command) = CacheConfig::from_args(&args(
            "--app shop --name worker-3 --timeout-ms 250 --socket-root /var/run set ab 42",
        ))
        .unwrap();

        assert_eq!(config.role, Role::Participant);
        assert_eq!(config.process_name(), "worker-3");
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.socket_path(), PathBuf::from("/var/run/app.shop"));
        assert_eq!(
            command,
            Command::Set {
                key: "ab".to_string(),
                value: CacheValue::Number(42.0)
            }
        );
    }

    #[test]
    fn test_participant_get_args() {
        let (_, command) = CacheConfig::from_args(&args("get zz --app shop")).unwrap();
        assert_eq!(
            command,
            Command::Get {
                key: "zz".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_args() {
        assert!(CacheConfig::from_args(&args("get zz")).is_err());
        assert!(CacheConfig::from_args(&args("--app")).is_err());
        assert!(CacheConfig::from_args(&args("--app shop")).is_err());
        assert!(CacheConfig::from_args(&args("--app shop --coordinator get k")).is_err());
        assert!(CacheConfig::from_args(&args("--app shop delete k")).is_err());
        assert!(CacheConfig::from_args(&args("--app shop --timeout-ms soon get k")).is_err());
    }
}
