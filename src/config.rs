use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::MAX_BODY_LEN;

/// Environment variable consulted when no `--config` argument is given.
pub const CONFIG_ENV: &str = "COURIER_CONFIG";
/// File looked up in the working directory as a last resort.
pub const DEFAULT_CONFIG_FILE: &str = "courier.conf";

/// INI-style configuration: `[Section]` headers, `key = value` pairs and `#`
/// comments. Keys before the first section are globals.
#[derive(Debug)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Error reading file {}: {e}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = &line[1..line.len() - 1];
                current_section = Some(name.trim().to_string());
                continue;
            }

            if let Some(pos) = line.find('=') {
                let key = line[..pos].trim().to_string();
                let value = line[pos + 1..].trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        globals.insert(key, value);
                    }
                    Some(sec) => {
                        sections.entry(sec.clone()).or_default().insert(key, value);
                    }
                }
            }
        }
        Config { globals, sections }
    }

    pub fn empty() -> Self {
        Self {
            globals: HashMap::new(),
            sections: HashMap::new(),
        }
    }

    /// Resolves the configuration for a binary.
    ///
    /// Order: explicit path, `COURIER_CONFIG`, `courier.conf` in the working
    /// directory, built-in defaults. An explicit or env-provided path that
    /// cannot be read is an error; a missing default file is not.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, String> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::load(path);
            }
        }
        let default = Path::new(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            return Self::load(default);
        }
        Ok(Self::empty())
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty_or_default<'a>(
        &'a self,
        section: &str,
        key: &str,
        default: &'a str,
    ) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    /// Parses a numeric value, falling back to `default` when the key is
    /// missing or not a number.
    #[must_use]
    pub fn get_parsed_or<T: std::str::FromStr>(&self, section: &str, key: &str, default: T) -> T {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn get_bool_or(&self, section: &str, key: &str, default: bool) -> bool {
        match self.get_non_empty(section, key).map(str::to_ascii_lowercase) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            _ => default,
        }
    }
}

/// `0` means "no timeout".
fn millis_opt(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Settings for the protocol server (`[Server]` section).
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_ip: String,
    pub port: u16,
    /// How many consecutive ports to try when the configured one is taken.
    pub port_attempts: u16,
    pub root_dir: PathBuf,
    pub chunk_size: usize,
    pub ack_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub welcome_text: String,
    /// Frames queued per chat member before it is evicted as too slow.
    pub chat_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_ip: "127.0.0.1".into(),
            port: 5050,
            port_attempts: 10,
            root_dir: PathBuf::from("server_files"),
            chunk_size: crate::protocol::DEFAULT_CHUNK_SIZE,
            ack_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            welcome_text: "Welcome to the chat room. Type /exit to leave.".into(),
            chat_queue_capacity: crate::chat::DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl ServerSettings {
    pub fn from_config(config: &Config) -> Self {
        let d = Self::default();
        let chunk_size: usize = config.get_parsed_or("Server", "chunk_size", d.chunk_size);
        Self {
            bind_ip: config
                .get_non_empty_or_default("Server", "bind_ip", &d.bind_ip)
                .to_string(),
            port: config.get_parsed_or("Server", "port", d.port),
            port_attempts: config
                .get_parsed_or("Server", "port_attempts", d.port_attempts)
                .max(1),
            root_dir: config
                .get_non_empty("Server", "root_dir")
                .map_or(d.root_dir, PathBuf::from),
            chunk_size: chunk_size.clamp(1, MAX_BODY_LEN),
            ack_timeout: millis_opt(config.get_parsed_or("Server", "ack_timeout_ms", 30_000)),
            idle_timeout: millis_opt(config.get_parsed_or("Server", "idle_timeout_ms", 0)),
            welcome_text: config
                .get_non_empty_or_default("Server", "welcome_text", &d.welcome_text)
                .to_string(),
            chat_queue_capacity: config
                .get_parsed_or("Server", "chat_queue_capacity", d.chat_queue_capacity)
                .max(1),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }
}

/// Settings for the interactive client (`[Client]` section).
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub server_addr: String,
    pub root_dir: PathBuf,
    pub response_timeout: Option<Duration>,
    /// Upper bound on whole-transfer attempts for one fetch.
    pub max_attempts: u32,
    pub inbox_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:5050".into(),
            root_dir: PathBuf::from("client_files"),
            response_timeout: Some(Duration::from_secs(30)),
            max_attempts: 3,
            inbox_capacity: 64,
        }
    }
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        let d = Self::default();
        Self {
            server_addr: config
                .get_non_empty_or_default("Client", "server_addr", &d.server_addr)
                .to_string(),
            root_dir: config
                .get_non_empty("Client", "root_dir")
                .map_or(d.root_dir, PathBuf::from),
            response_timeout: millis_opt(config.get_parsed_or(
                "Client",
                "response_timeout_ms",
                30_000,
            )),
            max_attempts: config
                .get_parsed_or("Client", "max_attempts", d.max_attempts)
                .max(1),
            inbox_capacity: config
                .get_parsed_or("Client", "inbox_capacity", d.inbox_capacity)
                .max(1),
        }
    }
}

/// Settings for the static HTTP responder (`[Http]` section).
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub bind_ip: String,
    pub port: u16,
    pub port_attempts: u16,
    pub root_dir: PathBuf,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_ip: "127.0.0.1".into(),
            port: 8080,
            port_attempts: 10,
            root_dir: PathBuf::from("http_files"),
        }
    }
}

impl HttpSettings {
    pub fn from_config(config: &Config) -> Self {
        let d = Self::default();
        Self {
            bind_ip: config
                .get_non_empty_or_default("Http", "bind_ip", &d.bind_ip)
                .to_string(),
            port: config.get_parsed_or("Http", "port", d.port),
            port_attempts: config
                .get_parsed_or("Http", "port_attempts", d.port_attempts)
                .max(1),
            root_dir: config
                .get_non_empty("Http", "root_dir")
                .map_or(d.root_dir, PathBuf::from),
        }
    }
}

/// Where and how a process writes its log (`[Logging]` section).
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    pub dir: Option<PathBuf>,
    pub file_name: Option<String>,
    pub echo: bool,
}

impl LogSettings {
    /// Reads `<role>_log_path` and `<role>_log_filename`, where `role` is
    /// `server`, `client` or `http`.
    pub fn from_config(config: &Config, role: &str) -> Self {
        let dir = config
            .get_non_empty("Logging", &format!("{role}_log_path"))
            .map(expand_path);
        let file_name = Some(
            config
                .get_non_empty_or_default("Logging", &format!("{role}_log_filename"), role)
                .to_string(),
        );
        Self {
            dir,
            file_name,
            echo: config.get_bool_or("Logging", "echo", role != "client"),
        }
    }
}

/// Expands tilde (`~`) in file paths to the user's home directory.
pub fn expand_path(path_str: &str) -> PathBuf {
    if path_str.starts_with('~') {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);

        if let Some(mut home_path) = home {
            if path_str == "~" {
                return home_path;
            }
            if path_str.starts_with("~/") || path_str.starts_with("~\\") {
                home_path.push(&path_str[2..]);
                return home_path;
            }
        }
    }
    PathBuf::from(path_str)
}

/// Command-line arguments shared by the binaries:
/// `[--config PATH] [ADDR | IP PORT]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub positional: Vec<String>,
}

impl CliArgs {
    /// Parses everything after the program name.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut out = Self::default();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            if arg == "--config" {
                let path = iter.next().ok_or("--config needs a path")?;
                out.config = Some(PathBuf::from(path));
            } else if let Some(path) = arg.strip_prefix("--config=") {
                out.config = Some(PathBuf::from(path));
            } else {
                out.positional.push(arg);
            }
        }
        Ok(out)
    }

    /// Applies an `ADDR` or `IP PORT` override to `ip`/`port`.
    pub fn apply_listen_addr(&self, ip: &mut String, port: &mut u16) -> Result<(), String> {
        match self.positional.as_slice() {
            [] => Ok(()),
            [addr] => {
                let (host, p) = addr
                    .rsplit_once(':')
                    .ok_or_else(|| format!("expected IP:PORT, got {addr:?}"))?;
                *port = p.parse().map_err(|_| format!("invalid port {p:?}"))?;
                *ip = host.to_owned();
                Ok(())
            }
            [host, p] => {
                *port = p.parse().map_err(|_| format!("invalid port {p:?}"))?;
                *ip = host.clone();
                Ok(())
            }
            _ => Err("too many arguments".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# courier sample
welcome_text = "global hello"

[Server]
port = 6000
chunk_size = 0
ack_timeout_ms = 0
chat_queue_capacity = 0
root_dir = /srv/files

[Client]
max_attempts = 5
response_timeout_ms = 1500

[Logging]
echo = off
server_log_filename = srv
"#;

    #[test]
    fn parses_sections_and_globals() {
        let cfg = Config::parse(SAMPLE);
        assert_eq!(cfg.get("Server", "port"), Some("6000"));
        assert_eq!(cfg.get_global("welcome_text"), Some("global hello"));
        assert_eq!(cfg.get("Client", "missing"), None);
    }

    #[test]
    fn server_settings_apply_defaults_and_clamps() {
        let s = ServerSettings::from_config(&Config::parse(SAMPLE));
        assert_eq!(s.port, 6000);
        assert_eq!(s.bind_ip, "127.0.0.1");
        assert_eq!(s.chunk_size, 1, "zero chunk size is clamped");
        assert_eq!(s.ack_timeout, None, "0 disables the ack timeout");
        assert_eq!(s.chat_queue_capacity, 1);
        assert_eq!(s.root_dir, PathBuf::from("/srv/files"));
        assert_eq!(s.welcome_text, "global hello");
        assert_eq!(s.bind_addr(), "127.0.0.1:6000");
    }

    #[test]
    fn client_settings_read_client_section() {
        let c = ClientSettings::from_config(&Config::parse(SAMPLE));
        assert_eq!(c.max_attempts, 5);
        assert_eq!(c.response_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(c.server_addr, "127.0.0.1:5050");
    }

    #[test]
    fn log_settings_use_role_keys() {
        let cfg = Config::parse(SAMPLE);
        let server = LogSettings::from_config(&cfg, "server");
        assert_eq!(server.file_name.as_deref(), Some("srv"));
        assert!(!server.echo);
        assert!(server.dir.is_none());

        let client = LogSettings::from_config(&cfg, "client");
        assert_eq!(client.file_name.as_deref(), Some("client"));
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_args_split_config_from_address() {
        let a = CliArgs::parse(args(&["--config", "my.conf", "0.0.0.0", "7000"])).unwrap_or_default();
        assert_eq!(a.config, Some(PathBuf::from("my.conf")));

        let (mut ip, mut port) = ("127.0.0.1".to_string(), 5050);
        assert!(a.apply_listen_addr(&mut ip, &mut port).is_ok());
        assert_eq!((ip.as_str(), port), ("0.0.0.0", 7000));

        let b = CliArgs::parse(args(&["--config=x.conf", "10.0.0.1:9"])).unwrap_or_default();
        assert_eq!(b.config, Some(PathBuf::from("x.conf")));
        let (mut ip, mut port) = (String::new(), 0);
        assert!(b.apply_listen_addr(&mut ip, &mut port).is_ok());
        assert_eq!((ip.as_str(), port), ("10.0.0.1", 9));
    }

    #[test]
    fn cli_args_reject_bad_input() {
        assert!(CliArgs::parse(args(&["--config"])).is_err());
        let a = CliArgs::parse(args(&["host:notaport"])).unwrap_or_default();
        let (mut ip, mut port) = (String::new(), 0);
        assert!(a.apply_listen_addr(&mut ip, &mut port).is_err());
        let many = CliArgs::parse(args(&["a", "b", "c"])).unwrap_or_default();
        assert!(many.apply_listen_addr(&mut ip, &mut port).is_err());
    }

    #[test]
    fn empty_config_gives_defaults() {
        let s = ServerSettings::from_config(&Config::empty());
        assert_eq!(s.port, 5050);
        assert_eq!(s.chunk_size, 4096);
        assert_eq!(s.ack_timeout, Some(Duration::from_secs(30)));
        assert_eq!(s.idle_timeout, None);
        assert_eq!(s.chat_queue_capacity, 256);
    }
}
