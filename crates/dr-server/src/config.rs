use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development; override via
/// environment variables (or a `.env` file) in production.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Directory artifacts are written to (default: `./results`).
    pub results_dir: PathBuf,
    /// Model idle window before automatic unload (default: 30 minutes).
    pub idle_timeout: Duration,
    /// Worker pool size (default: 1, to avoid oversubscribing the model's
    /// memory footprint).
    pub workers: usize,
    /// Admission queue capacity; `None` means unbounded.
    pub queue_depth: Option<usize>,
    /// Load the model at startup instead of on the first job.
    pub preload_model: bool,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default     |
    /// |-------------------------|-------------|
    /// | `HOST`                  | `0.0.0.0`   |
    /// | `PORT`                  | `8000`      |
    /// | `RESULTS_DIR`           | `./results` |
    /// | `MODEL_TIMEOUT_MINUTES` | `30`        |
    /// | `WORKERS`               | `1`         |
    /// | `QUEUE_DEPTH`           | unbounded   |
    /// | `MODEL_PRELOAD`         | `1`         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let results_dir = PathBuf::from(
            std::env::var("RESULTS_DIR").unwrap_or_else(|_| "./results".into()),
        );

        let timeout_minutes: f64 = std::env::var("MODEL_TIMEOUT_MINUTES")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("MODEL_TIMEOUT_MINUTES must be a number");

        let workers: usize = std::env::var("WORKERS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("WORKERS must be a valid usize");

        let queue_depth = std::env::var("QUEUE_DEPTH")
            .ok()
            .map(|v| v.parse().expect("QUEUE_DEPTH must be a valid usize"));

        let preload_model = std::env::var("MODEL_PRELOAD")
            .map(|v| v != "0")
            .unwrap_or(true);

        Self {
            host,
            port,
            results_dir,
            idle_timeout: Duration::from_secs_f64(timeout_minutes * 60.0),
            workers: workers.max(1),
            queue_depth,
            preload_model,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            results_dir: PathBuf::from("./results"),
            idle_timeout: Duration::from_secs(30 * 60),
            workers: 1,
            queue_depth: None,
            preload_model: true,
        }
    }
}
