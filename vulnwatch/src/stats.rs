use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::json;
use vulnwatch_store::Db;

#[derive(clap::Args, Debug)]
#[command(about = "Print record counts and the severity distribution")]
pub struct Run {
    #[arg(long = "db-base", env = "VULNWATCH_DB_BASE", default_value = "data")]
    pub db_base: PathBuf,
}

impl Run {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let db = Db::new(&self.db_base).await?;

        let counts = db.counts().await?;
        let severities = db.severity_stats().await?;
        let top = db.top_components(5).await?;

        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "counts": counts,
                "severities": severities,
                "top_components": top,
            }))?
        );

        Ok(ExitCode::SUCCESS)
    }
}
