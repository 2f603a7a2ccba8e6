use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "churn-backend")]
#[command(about = "Customer churn prediction API backed by an external predictor process")]
pub struct AppConfig {
    /// Address to bind the HTTP server
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP server
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Number of HTTP workers (defaults to the number of CPUs)
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,

    /// SQLite database holding users and prediction results
    #[arg(long, env = "DATABASE_PATH", default_value = "prediction.db")]
    pub database_path: PathBuf,

    /// Directory with the login and index pages
    #[arg(long, env = "PUBLIC_DIR", default_value = "./public")]
    pub public_dir: PathBuf,

    /// Executable that produces predictions
    #[arg(long, env = "PREDICTOR_PROGRAM", default_value = "python")]
    pub predictor_program: String,

    /// Arguments placed before the JSON input array
    #[arg(
        long = "predictor-arg",
        env = "PREDICTOR_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_value = "./predict.py"
    )]
    pub predictor_args: Vec<String>,

    /// Kill the predictor after this many seconds. Unbounded when unset.
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS")]
    pub inference_timeout_secs: Option<u64>,

    /// Lifetime of a login session
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = 3600)]
    pub session_ttl_secs: u64,

    /// Where download reports are written before being sent
    #[arg(long, env = "REPORT_DIR")]
    pub report_dir: Option<PathBuf>,

    /// Allowed CORS origins; any origin when empty
    #[arg(long = "cors-origin", env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Admin account created when the users table is empty
    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    pub admin_username: String,

    #[arg(long, env = "ADMIN_PASSWORD", default_value = "password123", hide_env_values = true)]
    pub admin_password: String,

    #[arg(long, env = "BCRYPT_COST", default_value_t = 10)]
    pub bcrypt_cost: u32,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl AppConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.filter(|w| *w > 0).unwrap_or_else(num_cpus::get)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        self.inference_timeout_secs.map(Duration::from_secs)
    }

    pub fn report_dir(&self) -> PathBuf {
        self.report_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
