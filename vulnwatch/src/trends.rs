use std::path::PathBuf;
use std::process::ExitCode;

use vulnwatch_store::Db;

#[derive(clap::Args, Debug)]
#[command(about = "Per-package counts of recently discovered vulnerabilities")]
pub struct Run {
    #[arg(long = "db-base", env = "VULNWATCH_DB_BASE", default_value = "data")]
    pub db_base: PathBuf,

    #[arg(long, default_value_t = 30)]
    pub days: i64,
}

impl Run {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let db = Db::new(&self.db_base).await?;
        let trends = db.trends(self.days).await?;
        println!("{}", serde_json::to_string_pretty(&trends)?);

        Ok(ExitCode::SUCCESS)
    }
}
