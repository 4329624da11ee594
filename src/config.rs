//! Configuration management for the Prensa server

use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FileConfig,
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Directory for uploaded inputs and generated outputs.
    pub temp_dir: PathBuf,
    pub max_file_size_mb: u64,
    pub max_files_count: usize,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of blocking workers for CPU-bound PDF processing.
    pub count: usize,
}

impl FileConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            files: FileConfig {
                temp_dir: PathBuf::from("/tmp/prensa"),
                max_file_size_mb: 50,
                max_files_count: 20,
            },
            workers: WorkerConfig {
                count: default_worker_count(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            files: FileConfig {
                temp_dir: env::var("TEMP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.files.temp_dir),
                max_file_size_mb: env::var("MAX_FILE_SIZE_MB")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.files.max_file_size_mb),
                max_files_count: env::var("MAX_FILES_COUNT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.files.max_files_count),
            },
            workers: WorkerConfig {
                count: env::var("WORKERS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|&n| n > 0)
                    .unwrap_or(defaults.workers.count),
            },
        }
    }
}
