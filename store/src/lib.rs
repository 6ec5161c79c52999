use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use vulnwatch_model::{
    Article, CombinedRow, ComponentCount, Counts, CriticalRow, CveRecord, ImpactRow, PackageRecord, Severity,
    SeverityStat, SupplyChainEdge, TrendSample,
};

static DB_FILE_NAME: &str = "vulnerabilities.db";

/// Read-side projection of both vulnerability tables onto the combined row
/// shape. General rows reuse the published date as the discovered date.
const COMBINED_SELECT: &str = r#"
    select
        cve_id,
        title,
        description,
        severity,
        cvss_score,
        null as affected_component,
        null as ecosystem,
        null as vulnerability_type,
        published_date,
        published_date as discovered_date,
        source,
        url
    from cve_vulnerabilities
    union all
    select
        null as cve_id,
        title,
        description,
        severity,
        cvss_score,
        package_name as affected_component,
        ecosystem,
        vulnerability_type,
        published_date,
        discovered_date,
        source,
        url
    from package_vulnerabilities
"#;

/// Conjunctive filter over the combined projection. Every field is
/// optional; absent fields do not constrain the result.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    pub severity: Option<Severity>,
    pub component: Option<String>,
    pub max_age_days: Option<i64>,
}

/// True when the error originated in the database engine itself (e.g. a
/// constraint violation) rather than in the pool or the connection.
pub fn is_database_rejection(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<sqlx::Error>()
        .map(|e| e.as_database_error().is_some())
        .unwrap_or(false)
}

pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the database file under `base`. Failure
    /// here means the store is unusable and must abort the caller.
    pub async fn new(base: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        std::fs::create_dir_all(base.as_ref())?;
        let db = Self {
            pool: SqlitePool::connect_with(
                SqliteConnectOptions::default()
                    .filename(base.as_ref().join(DB_FILE_NAME))
                    .create_if_missing(true),
            )
            .await?,
        };
        db.initialize().await?;
        Ok(db)
    }

    /// Private in-memory database, one per call. A single pooled connection
    /// keeps every query on the same in-memory instance.
    pub async fn memory() -> Result<Self, anyhow::Error> {
        let db = Self {
            pool: SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::from_str(":memory:")?)
                .await?,
        };
        db.initialize().await?;
        Ok(db)
    }

    /// Insert-or-ignore keyed on the unique external identifier. Returns
    /// whether a row was actually written; a duplicate is a no-op, not an
    /// error.
    pub async fn insert_cve(&self, record: &CveRecord) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            r#"insert or ignore into cve_vulnerabilities
                (cve_id, title, description, cvss_score, severity, published_date, modified_date, source, url)
                values ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&record.cve_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.cvss_score)
        .bind(record.severity.as_str())
        .bind(record.published_date)
        .bind(record.modified_date)
        .bind(&record.source)
        .bind(&record.url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Always inserts a new row; package vulnerabilities carry no natural
    /// key. Returns the generated row id.
    pub async fn insert_package(&self, record: &PackageRecord) -> Result<i64, anyhow::Error> {
        let result = sqlx::query(
            r#"insert into package_vulnerabilities
                (package_name, ecosystem, vulnerability_type, cvss_score, severity,
                 title, description, published_date, discovered_date, affected_versions,
                 patched_version, source, url)
                values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(&record.package_name)
        .bind(record.ecosystem.as_str())
        .bind(record.vulnerability_type.as_str())
        .bind(record.cvss_score)
        .bind(record.severity.as_str())
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.published_date)
        .bind(record.discovered_date)
        .bind(&record.affected_versions)
        .bind(&record.patched_version)
        .bind(&record.source)
        .bind(&record.url)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn insert_supply_chain(&self, edge: &SupplyChainEdge) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"insert into supply_chain (parent_package, dependent_package, ecosystem, vulnerability_id)
                values ($1, $2, $3, $4)"#,
        )
        .bind(&edge.parent_package)
        .bind(&edge.dependent_package)
        .bind(edge.ecosystem.as_str())
        .bind(edge.vulnerability_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_article(&self, article: &Article) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"insert into articles (title, content, source, category, url, published_date)
                values ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.source)
        .bind(&article.category)
        .bind(&article.url)
        .bind(article.published_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_trend(&self, sample: &TrendSample) -> Result<(), anyhow::Error> {
        sqlx::query(r#"insert into trends (keyword, count, severity_level) values ($1, $2, $3)"#)
            .bind(&sample.keyword)
            .bind(sample.count)
            .bind(sample.severity.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Both tables projected onto the common shape, newest first.
    pub async fn combined(&self) -> Result<Vec<CombinedRow>, anyhow::Error> {
        let query = format!("select * from ({COMBINED_SELECT}) order by published_date desc");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(combined_row).collect())
    }

    /// Conjunctive search over the combined projection. The component
    /// filter is a case-sensitive substring match against the package name
    /// or the external identifier; the age filter compares calendar-day
    /// distance from now.
    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<CombinedRow>, anyhow::Error> {
        let mut conditions = Vec::new();
        if filter.severity.is_some() {
            conditions.push("severity = ?");
        }
        if filter.component.is_some() {
            conditions.push("(instr(coalesce(affected_component, ''), ?) > 0 or instr(coalesce(cve_id, ''), ?) > 0)");
        }
        if filter.max_age_days.is_some() {
            conditions.push("julianday('now') - julianday(published_date) <= ?");
        }

        let mut query = format!("select * from ({COMBINED_SELECT})");
        if !conditions.is_empty() {
            query.push_str(" where ");
            query.push_str(&conditions.join(" and "));
        }
        query.push_str(" order by published_date desc");

        let mut query = sqlx::query(&query);
        if let Some(severity) = filter.severity {
            query = query.bind(severity.as_str());
        }
        if let Some(component) = &filter.component {
            query = query.bind(component).bind(component);
        }
        if let Some(days) = filter.max_age_days {
            query = query.bind(days);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(combined_row).collect())
    }

    /// Count and share per severity across both tables. Buckets with zero
    /// occurrences are omitted.
    pub async fn severity_stats(&self) -> Result<HashMap<Severity, SeverityStat>, anyhow::Error> {
        let rows = sqlx::query(
            r#"
            select severity, count(*) as count
            from (
                select severity from cve_vulnerabilities
                union all
                select severity from package_vulnerabilities
            )
            where severity is not null
            group by severity
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = rows.iter().map(|row| row.get::<i64, _>("count")).sum();
        let mut stats = HashMap::new();
        for row in &rows {
            let severity = Severity::from(row.get::<String, _>("severity").as_str());
            let count = row.get::<i64, _>("count");
            let percentage = if total > 0 {
                (count as f64 / total as f64 * 1000.0).round() / 10.0
            } else {
                0.0
            };
            stats.insert(severity, SeverityStat { count, percentage });
        }

        Ok(stats)
    }

    /// Most-affected packages, count descending with a name-ascending
    /// tie-break to keep the ordering deterministic.
    pub async fn top_components(&self, limit: u32) -> Result<Vec<ComponentCount>, anyhow::Error> {
        let rows = sqlx::query(
            r#"
            select package_name as component, count(*) as count
            from package_vulnerabilities
            where package_name is not null
            group by package_name
            order by count desc, package_name asc
            limit $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ComponentCount {
                component: row.get("component"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Package-vulnerability counts per package, restricted to rows whose
    /// discovered date falls within the last `days` days.
    pub async fn trends(&self, days: i64) -> Result<HashMap<String, i64>, anyhow::Error> {
        let rows = sqlx::query(
            r#"
            select package_name, count(*) as count
            from package_vulnerabilities
            where julianday('now') - julianday(discovered_date) <= $1
            and package_name is not null
            group by package_name
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>("package_name"), row.get::<i64, _>("count")))
            .collect())
    }

    /// Rows from both tables with a score of at least 9.0, highest score
    /// first, then newest first. Package rows are identified as
    /// `PKG-<package name>`.
    pub async fn critical(&self, limit: u32) -> Result<Vec<CriticalRow>, anyhow::Error> {
        let rows = sqlx::query(
            r#"
            select * from (
                select cve_id as id, title, cvss_score, published_date, url
                from cve_vulnerabilities
                where cvss_score >= 9.0
                union all
                select 'PKG-' || package_name as id, title, cvss_score, published_date, url
                from package_vulnerabilities
                where cvss_score >= 9.0
            )
            order by cvss_score desc, published_date desc
            limit $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CriticalRow {
                id: row.get("id"),
                title: row.get("title"),
                cvss_score: row.get("cvss_score"),
                published_date: row.get("published_date"),
                url: row.get("url"),
            })
            .collect())
    }

    /// Everything depending on `package`, joined with the linked
    /// vulnerability row when one exists.
    pub async fn supply_chain_impact(&self, package: &str) -> Result<Vec<ImpactRow>, anyhow::Error> {
        let rows = sqlx::query(
            r#"
            select sc.parent_package, sc.dependent_package, sc.ecosystem,
                   pv.severity, pv.cvss_score, pv.description
            from supply_chain sc
            left join package_vulnerabilities pv on sc.vulnerability_id = pv.id
            where sc.dependent_package = $1
            "#,
        )
        .bind(package)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ImpactRow {
                parent_package: row.get("parent_package"),
                dependent_package: row.get("dependent_package"),
                ecosystem: row.get("ecosystem"),
                severity: row
                    .get::<Option<String>, _>("severity")
                    .map(|severity| Severity::from(severity.as_str())),
                cvss_score: row.get("cvss_score"),
                description: row.get("description"),
            })
            .collect())
    }

    pub async fn counts(&self) -> Result<Counts, anyhow::Error> {
        let cve: i64 = sqlx::query(r#"select count(*) as count from cve_vulnerabilities"#)
            .fetch_one(&self.pool)
            .await?
            .get("count");
        let packages: i64 = sqlx::query(r#"select count(*) as count from package_vulnerabilities"#)
            .fetch_one(&self.pool)
            .await?
            .get("count");

        Ok(Counts {
            cve,
            packages,
            total: cve + packages,
        })
    }

    /// Delete every row from every table.
    pub async fn clear_all(&self) -> Result<(), anyhow::Error> {
        for table in [
            "cve_vulnerabilities",
            "package_vulnerabilities",
            "supply_chain",
            "articles",
            "trends",
        ] {
            sqlx::query(&format!("delete from {table}")).execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn initialize(&self) -> Result<(), anyhow::Error> {
        self.create_cve_table().await?;
        self.create_package_table().await?;
        self.create_supply_chain_table().await?;
        self.create_articles_table().await?;
        self.create_trends_table().await?;
        Ok(())
    }

    async fn create_cve_table(&self) -> Result<(), anyhow::Error> {
        log::debug!("create table 'cve_vulnerabilities'");
        sqlx::query(
            r#"create table if not exists cve_vulnerabilities (
                    id integer primary key autoincrement,
                    cve_id text unique not null,
                    title text not null,
                    description text not null,
                    cvss_score real,
                    severity text check(severity in ('CRITICAL','HIGH','MEDIUM','LOW','NONE')),
                    published_date text,
                    modified_date text,
                    source text,
                    url text,
                    collected_date text default current_timestamp
                )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            create index if not exists idx_cve_severity on cve_vulnerabilities ( severity ) ;
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_package_table(&self) -> Result<(), anyhow::Error> {
        log::debug!("create table 'package_vulnerabilities'");
        sqlx::query(
            r#"create table if not exists package_vulnerabilities (
                    id integer primary key autoincrement,
                    package_name text not null,
                    ecosystem text check(ecosystem in ('npm','pip','maven','docker','kubernetes','github')),
                    vulnerability_type text,
                    cvss_score real,
                    severity text check(severity in ('CRITICAL','HIGH','MEDIUM','LOW','NONE')),
                    title text not null,
                    description text not null,
                    published_date text,
                    discovered_date text,
                    affected_versions text,
                    patched_version text,
                    source text,
                    url text,
                    collected_date text default current_timestamp
                )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            create index if not exists idx_pkg_severity on package_vulnerabilities ( severity ) ;
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            create index if not exists idx_pkg_ecosystem on package_vulnerabilities ( ecosystem ) ;
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            create index if not exists idx_pkg_name on package_vulnerabilities ( package_name ) ;
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_supply_chain_table(&self) -> Result<(), anyhow::Error> {
        log::debug!("create table 'supply_chain'");
        sqlx::query(
            r#"create table if not exists supply_chain (
                    id integer primary key autoincrement,
                    parent_package text not null,
                    dependent_package text not null,
                    ecosystem text,
                    vulnerability_id integer,
                    impact_score integer default 0,
                    foreign key(vulnerability_id) references package_vulnerabilities(id)
                )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_articles_table(&self) -> Result<(), anyhow::Error> {
        log::debug!("create table 'articles'");
        sqlx::query(
            r#"create table if not exists articles (
                    id integer primary key autoincrement,
                    title text not null,
                    content text,
                    source text,
                    category text,
                    url text,
                    published_date text,
                    collected_date text default current_timestamp
                )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_trends_table(&self) -> Result<(), anyhow::Error> {
        log::debug!("create table 'trends'");
        sqlx::query(
            r#"create table if not exists trends (
                    id integer primary key autoincrement,
                    keyword text not null,
                    count integer default 1,
                    severity_level text,
                    last_updated text default current_timestamp
                )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn combined_row(row: &SqliteRow) -> CombinedRow {
    CombinedRow {
        cve_id: row.get("cve_id"),
        title: row.get("title"),
        description: row.get("description"),
        severity: Severity::from(row.get::<String, _>("severity").as_str()),
        cvss_score: row.get("cvss_score"),
        affected_component: row.get("affected_component"),
        ecosystem: row.get("ecosystem"),
        vulnerability_type: row.get("vulnerability_type"),
        published_date: row.get("published_date"),
        discovered_date: row.get("discovered_date"),
        source: row.get("source"),
        url: row.get("url"),
    }
}
