//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración con soporte para argumentos CLI, variables de entorno y un
//! archivo TOML opcional.
//!
//! ## Precedencia
//!
//! CLI / variable de entorno > archivo `--config` > valor por defecto.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./concurrent_http --port 8080 \
//!   --workers 4 \
//!   --threads-per-worker 10 \
//!   --cache-size-mb 16 \
//!   --vhost site.local=./www/site
//! ```
//!
//! ### Archivo
//! ```toml
//! port = 8080
//! document_root = "./www"
//! num_workers = 4
//!
//! [[vhost]]
//! hostname = "site.local"
//! root = "./www/site"
//! ```

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Par (hostname, document root) de un virtual host
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VirtualHost {
    pub hostname: String,
    pub root: PathBuf,
}

impl std::str::FromStr for VirtualHost {
    type Err = String;

    /// Formato `HOST=ROOT`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hostname, root) = s
            .split_once('=')
            .ok_or_else(|| format!("expected HOST=ROOT, got '{}'", s))?;
        Ok(Self {
            hostname: hostname.trim().to_string(),
            root: PathBuf::from(root.trim()),
        })
    }
}

/// Errores de carga o validación
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Number of workers must be >= 1")]
    NoWorkers,

    #[error("Threads per worker must be >= 1")]
    NoThreads,

    #[error("Connection timeout must be > 0")]
    ZeroTimeout,

    #[error("Script extension must not be empty")]
    EmptyScriptExtension,

    #[error("Virtual host with empty hostname (root: {0})")]
    EmptyVhostName(PathBuf),

    #[error("Max cacheable entry ({entry_kb} KB) exceeds cache size ({cache_mb} MB)")]
    EntryLargerThanCache { entry_kb: usize, cache_mb: usize },

    #[error("Cannot read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Cli(#[from] clap::Error),
}

/// Configuración del servidor HTTP
#[derive(Debug, Clone, Parser)]
#[command(name = "concurrent_http")]
#[command(about = "Servidor HTTP/1.1 concurrente: procesos worker, pool de threads y cache LRU")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Archivo TOML opcional con valores de configuración
    #[arg(short, long = "config", env = "HTTP_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Document root por defecto
    #[arg(long = "document-root", default_value = "./www", env = "DOCUMENT_ROOT")]
    pub document_root: PathBuf,

    // === Procesos y threads ===

    /// Número de procesos worker
    #[arg(short = 'w', long = "workers", default_value = "4", env = "NUM_WORKERS")]
    pub num_workers: usize,

    /// Threads del pool de cada worker
    #[arg(long = "threads-per-worker", default_value = "10", env = "THREADS_PER_WORKER")]
    pub threads_per_worker: usize,

    /// Backlog del socket de escucha
    #[arg(long = "backlog", default_value = "128", env = "LISTEN_BACKLOG")]
    pub backlog: i32,

    // === Cache ===

    /// Tamaño de la cache LRU de cada worker en MB (0 = sin cache)
    #[arg(long = "cache-size-mb", default_value = "10", env = "CACHE_SIZE_MB")]
    pub cache_size_mb: usize,

    /// Tamaño máximo de un archivo cacheable en KB
    #[arg(long = "cache-max-entry-kb", default_value = "1024", env = "CACHE_MAX_ENTRY_KB")]
    pub cache_max_entry_kb: usize,

    // === Timeouts ===

    /// Timeout de lectura por conexión en segundos (keep-alive)
    #[arg(long = "timeout", default_value = "5", env = "TIMEOUT_SECS")]
    pub timeout_secs: u64,

    // === Virtual hosts ===

    /// Virtual host con formato HOST=ROOT (repetible)
    #[arg(long = "vhost")]
    pub vhosts: Vec<VirtualHost>,

    // === Logs y estadísticas ===

    /// Archivo de access log
    #[arg(long = "access-log", default_value = "./logs/access.log", env = "ACCESS_LOG")]
    pub access_log: PathBuf,

    /// Tamaño a partir del cual se rota el access log
    #[arg(long = "access-log-max-bytes", default_value = "10485760", env = "ACCESS_LOG_MAX_BYTES")]
    pub access_log_max_bytes: u64,

    /// Intervalo en segundos del reporte periódico del master
    #[arg(long = "stats-interval", default_value = "30", env = "STATS_INTERVAL_SECS")]
    pub stats_interval_secs: u64,

    // === Scripts ===

    /// Intérprete para scripts dinámicos
    #[arg(long = "script-interpreter", default_value = "python3", env = "SCRIPT_INTERPRETER")]
    pub script_interpreter: String,

    /// Extensión (sin punto) de los scripts dinámicos
    #[arg(long = "script-extension", default_value = "py", env = "SCRIPT_EXTENSION")]
    pub script_extension: String,

    /// Máximo de bytes capturados de la salida de un script
    #[arg(long = "script-output-limit", default_value = "65536", env = "SCRIPT_OUTPUT_LIMIT")]
    pub script_output_limit: usize,
}

/// Contenido del archivo TOML; todo es opcional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub document_root: Option<PathBuf>,
    pub num_workers: Option<usize>,
    pub threads_per_worker: Option<usize>,
    pub backlog: Option<i32>,
    pub cache_size_mb: Option<usize>,
    pub cache_max_entry_kb: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub access_log: Option<PathBuf>,
    pub access_log_max_bytes: Option<u64>,
    pub stats_interval_secs: Option<u64>,
    pub script_interpreter: Option<String>,
    pub script_extension: Option<String>,
    pub script_output_limit: Option<usize>,
    #[serde(default, rename = "vhost")]
    pub vhosts: Vec<VirtualHost>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// Parsea CLI y entorno y, si se indicó `--config`, mezcla el archivo
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::args_os())
    }

    /// Igual que `load` pero con argumentos explícitos
    pub fn load_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let mut config = Self::from_arg_matches(&matches)?;

        if let Some(path) = config.config_file.clone() {
            let file = FileConfig::load(&path)?;
            config.merge_file(file, &matches);
        }

        Ok(config)
    }

    /// Aplica valores del archivo solo donde CLI/entorno no dieron uno
    fn merge_file(&mut self, file: FileConfig, matches: &ArgMatches) {
        let from_default =
            |id: &str| matches!(matches.value_source(id), None | Some(ValueSource::DefaultValue));

        macro_rules! merge {
            ($config:ident, $file:ident; $($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = $file.$field {
                        if from_default(stringify!($field)) {
                            $config.$field = value;
                        }
                    }
                )*
            };
        }

        merge!(
            self, file;
            port,
            host,
            document_root,
            num_workers,
            threads_per_worker,
            backlog,
            cache_size_mb,
            cache_max_entry_kb,
            timeout_secs,
            access_log,
            access_log_max_bytes,
            stats_interval_secs,
            script_interpreter,
            script_extension,
            script_output_limit,
        );

        self.vhosts.extend(file.vhosts);
    }

    /// Dirección completa para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout de lectura de cada conexión
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_capacity_bytes(&self) -> usize {
        self.cache_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn cache_max_entry_bytes(&self) -> usize {
        self.cache_max_entry_kb.saturating_mul(1024)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.threads_per_worker == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.script_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::EmptyScriptExtension);
        }
        if let Some(vhost) = self.vhosts.iter().find(|v| v.hostname.is_empty()) {
            return Err(ConfigError::EmptyVhostName(vhost.root.clone()));
        }
        if self.cache_size_mb > 0 && self.cache_max_entry_bytes() > self.cache_capacity_bytes() {
            return Err(ConfigError::EntryLargerThanCache {
                entry_kb: self.cache_max_entry_kb,
                cache_mb: self.cache_size_mb,
            });
        }
        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║           Concurrent HTTP/1.1 Server Configuration           ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:        {}", self.address());
        println!("   Document root:  {}", self.document_root.display());
        println!("   Timeout:        {} s", self.timeout_secs);
        println!();
        println!("👷 Processes & Threads:");
        println!("   Workers:        {}", self.num_workers);
        println!("   Threads/worker: {}", self.threads_per_worker);
        println!(
            "   Cache/worker:   {} MB (max entry {} KB)",
            self.cache_size_mb, self.cache_max_entry_kb
        );
        println!();

        if self.vhosts.is_empty() {
            println!("🏠 Virtual hosts: none");
        } else {
            println!("🏠 Virtual hosts:");
            for vhost in &self.vhosts {
                println!("   {:<20} -> {}", vhost.hostname, vhost.root.display());
            }
        }
        println!();
        println!("📝 Logs:");
        println!(
            "   Access log:     {} (rotates at {} bytes)",
            self.access_log.display(),
            self.access_log_max_bytes
        );
        println!("   Stats every:    {} s", self.stats_interval_secs);
        println!(
            "   Scripts:        *.{} via {}",
            self.script_extension, self.script_interpreter
        );
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: None,
            port: 8080,
            host: "127.0.0.1".to_string(),
            document_root: PathBuf::from("./www"),
            num_workers: 4,
            threads_per_worker: 10,
            backlog: 128,
            cache_size_mb: 10,
            cache_max_entry_kb: 1024,
            timeout_secs: 5,
            vhosts: Vec::new(),
            access_log: PathBuf::from("./logs/access.log"),
            access_log_max_bytes: 10 * 1024 * 1024,
            stats_interval_secs: 30,
            script_interpreter: "python3".to_string(),
            script_extension: "py".to_string(),
            script_output_limit: 65536,
        }
    }
}
