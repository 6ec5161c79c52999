use std::path::PathBuf;
use std::process::ExitCode;

use vulnwatch_store::Db;

#[derive(clap::Args, Debug)]
#[command(about = "List the highest-scored vulnerabilities")]
pub struct Run {
    #[arg(long = "db-base", env = "VULNWATCH_DB_BASE", default_value = "data")]
    pub db_base: PathBuf,

    #[arg(long, default_value_t = 10)]
    pub limit: u32,
}

impl Run {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let db = Db::new(&self.db_base).await?;
        let rows = db.critical(self.limit).await?;
        println!("{}", serde_json::to_string_pretty(&rows)?);

        Ok(ExitCode::SUCCESS)
    }
}
