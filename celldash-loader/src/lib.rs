use camino::Utf8PathBuf;

pub mod config;
pub mod engine;
pub mod reader;
pub mod store;
pub mod table;

pub fn initialize_logging(log_dir: Option<Utf8PathBuf>, debug: bool) {
    use tracing::Level;
    use tracing_subscriber::{filter::Targets, prelude::*};

    let level = if debug { Level::DEBUG } else { Level::INFO };
    let log_filter = Targets::new().with_target("celldash_loader", level);
    let log_layer = tracing_subscriber::fmt::layer();

    match log_dir {
        None => {
            let log_layer = log_layer.pretty().with_filter(log_filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
        Some(path) => {
            let log_writer = tracing_appender::rolling::daily(path, "celldash.log");
            let log_layer = log_layer
                .json()
                .with_writer(log_writer)
                .with_filter(log_filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
    }
}
