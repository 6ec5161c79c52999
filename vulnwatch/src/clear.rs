use std::path::PathBuf;
use std::process::ExitCode;

use vulnwatch_store::Db;

#[derive(clap::Args, Debug)]
#[command(about = "Delete every stored record")]
pub struct Run {
    #[arg(long = "db-base", env = "VULNWATCH_DB_BASE", default_value = "data")]
    pub db_base: PathBuf,

    /// Required; clearing is irreversible.
    #[arg(long)]
    pub yes: bool,
}

impl Run {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        if !self.yes {
            eprintln!("refusing to clear without --yes");
            return Ok(ExitCode::FAILURE);
        }

        let db = Db::new(&self.db_base).await?;
        let before = db.counts().await?;
        db.clear_all().await?;
        log::info!("cleared {} records", before.total);

        Ok(ExitCode::SUCCESS)
    }
}
