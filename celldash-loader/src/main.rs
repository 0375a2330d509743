use celldash_loader::{
    config::{Cli, Command},
    engine::{
        ingest::{self, IngestRequest},
        project::ProjectManager,
    },
    initialize_logging, reader,
    store::ElasticStore,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().unwrap_or_default();
    let Cli {
        config,
        log_dir,
        debug,
        command,
    } = Cli::parse();

    initialize_logging(log_dir, debug);

    let store = ElasticStore::new(&config)?;

    match command {
        Command::Load {
            data_directory,
            id,
            projects,
            reload,
            ordering,
        } => {
            if reload {
                ingest::clean(&store, &id, &projects).await?;
            }

            let analysis = reader::read_analysis_directory(&data_directory)?;
            let ordering = ordering
                .map(|path| reader::read_cell_ordering(&path))
                .transpose()?;

            ingest::ingest(
                &store,
                IngestRequest {
                    dashboard_id: id,
                    raw: analysis.raw,
                    metadata: analysis.metadata,
                    projects,
                    ordering,
                },
            )
            .await?;
        }
        Command::Clean {
            dashboard_id,
            projects,
        } => {
            ingest::clean(&store, &dashboard_id, &projects).await?;
        }
        Command::Init => {
            ingest::initialize(&store).await?;
        }
        Command::CreateProject { name, dashboards } => {
            ProjectManager::new(&store).create(&name, &dashboards).await?;
        }
        Command::ListProjects => {
            for project in ProjectManager::new(&store).list().await? {
                println!("{project}");
            }
        }
    }

    Ok(())
}
