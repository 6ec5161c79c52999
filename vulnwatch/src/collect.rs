use std::path::PathBuf;
use std::process::ExitCode;

use vulnwatch_harvester::{Harvester, HarvesterConfig};
use vulnwatch_store::Db;

#[derive(clap::Args, Debug)]
#[command(about = "Run one collection cycle against all configured sources")]
pub struct Run {
    #[arg(long = "db-base", env = "VULNWATCH_DB_BASE", default_value = "data")]
    pub db_base: PathBuf,

    /// YAML file overriding the built-in package and keyword targets.
    #[arg(long = "targets", env = "VULNWATCH_TARGETS")]
    pub targets: Option<PathBuf>,

    #[arg(long = "github-token", env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,
}

impl Run {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let config = match &self.targets {
            Some(path) => HarvesterConfig::from_file(path)?,
            None => HarvesterConfig::default(),
        };

        let db = Db::new(&self.db_base).await?;
        let harvester = Harvester::with_default_sources(db, &config, self.github_token);

        let stats = harvester.run().await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);

        Ok(ExitCode::SUCCESS)
    }
}
