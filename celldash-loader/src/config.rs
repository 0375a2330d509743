use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Args, serde::Deserialize, Clone)]
pub struct Config {
    #[arg(long, env = "CELLDASH_ES_HOST", default_value_t = String::from("localhost"))]
    es_host: String,
    #[arg(long, env = "CELLDASH_ES_PORT", default_value_t = 9200)]
    es_port: u16,
    #[arg(long, env = "CELLDASH_ES_USER", default_value_t)]
    es_user: String,
    #[arg(long, env = "CELLDASH_ES_PASSWORD", default_value_t)]
    es_password: String,
    #[arg(long, env = "CELLDASH_ES_TIMEOUT_SECS", default_value_t = 300)]
    es_timeout_secs: u64,
    /// Accept self-signed certificates from the store
    #[arg(long, env = "CELLDASH_ES_INSECURE", default_value_t)]
    es_insecure: bool,
}

impl Config {
    #[must_use]
    pub fn es_url(&self) -> String {
        let Self {
            es_host, es_port, ..
        } = self;

        format!("https://{es_host}:{es_port}/")
    }

    #[must_use]
    pub fn es_credentials(&self) -> (&str, &str) {
        (&self.es_user, &self.es_password)
    }

    #[must_use]
    pub fn es_timeout_secs(&self) -> u64 {
        self.es_timeout_secs
    }

    #[must_use]
    pub fn es_insecure(&self) -> bool {
        self.es_insecure
    }
}

#[derive(Parser)]
#[command(version, about = "Load single-cell QC dashboards into the search store")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,
    /// Write daily-rolling JSON logs here instead of pretty stderr output
    #[arg(long, env = "CELLDASH_LOG_DIR")]
    pub log_dir: Option<Utf8PathBuf>,
    /// Turn on debugging logs
    #[arg(long)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load one analysis directory as a dashboard
    Load {
        data_directory: Utf8PathBuf,
        /// ID of the dashboard
        #[arg(long)]
        id: String,
        /// Projects to load the dashboard into
        #[arg(long = "project", default_values_t = [String::from("DLP")])]
        projects: Vec<String>,
        /// Force-reload: clean the dashboard first
        #[arg(long)]
        reload: bool,
        /// Cell ordering / clone assignment CSV for merged dashboards
        #[arg(long)]
        ordering: Option<Utf8PathBuf>,
    },
    /// Delete a dashboard's indices, catalog entry, and project memberships
    Clean {
        dashboard_id: String,
        /// Remove from these projects only (default: all)
        #[arg(long = "project")]
        projects: Vec<String>,
    },
    /// Create the master index and the default project
    Init,
    /// Create a project role
    CreateProject {
        name: String,
        /// Pre-existing dashboards to include
        #[arg(long = "dashboard")]
        dashboards: Vec<String>,
    },
    /// List project names
    ListProjects,
}
