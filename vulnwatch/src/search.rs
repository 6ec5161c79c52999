use std::path::PathBuf;
use std::process::ExitCode;

use vulnwatch_model::Severity;
use vulnwatch_store::{Db, SearchFilter};

#[derive(clap::Args, Debug)]
#[command(about = "Search stored vulnerabilities")]
pub struct Run {
    #[arg(long = "db-base", env = "VULNWATCH_DB_BASE", default_value = "data")]
    pub db_base: PathBuf,

    /// Severity bucket (critical, high, medium, low).
    #[arg(long)]
    pub severity: Option<String>,

    /// Substring matched against the package name or the identifier.
    #[arg(long)]
    pub component: Option<String>,

    /// Only rows published within the last N days.
    #[arg(long = "max-age-days")]
    pub max_age_days: Option<i64>,
}

impl Run {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let db = Db::new(&self.db_base).await?;

        let filter = SearchFilter {
            severity: self.severity.as_deref().map(Severity::normalize),
            component: self.component,
            max_age_days: self.max_age_days,
        };

        let rows = db.search(&filter).await?;
        log::info!("{} rows matched", rows.len());
        println!("{}", serde_json::to_string_pretty(&rows)?);

        Ok(ExitCode::SUCCESS)
    }
}
