//! Read-only queries against `KuberFinalMailFiles`.
//!
//! Every statement is a static string with `?` placeholders; user input only
//! ever reaches the database as a bound parameter.

use async_trait::async_trait;
use sqlx::MySqlPool;
use std::future::Future;
use std::time::Duration;

use crate::errors::{AppError, ResultExt};
use crate::models::{AddressRow, CampaignAggregate, CustomerRecord, DashboardAggregate};

/// Source of the rows and aggregates behind the dashboard.
///
/// `search` is the raw user term; implementations match it as a
/// case-insensitive literal substring of "first middle last".
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn count_customers(&self, search: Option<&str>) -> Result<u64, AppError>;

    async fn fetch_customers(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CustomerRecord>, AppError>;

    /// Number of distinct campaign groups.
    async fn count_campaigns(&self) -> Result<u64, AppError>;

    async fn fetch_campaign_stats(
        &self,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CampaignAggregate>, AppError>;

    async fn dashboard_stats(&self) -> Result<DashboardAggregate, AppError>;

    async fn address_sample(&self, limit: u32) -> Result<Vec<AddressRow>, AppError>;
}

const COUNT_CUSTOMERS_SQL: &str = r#"
    SELECT COUNT(*)
    FROM KuberFinalMailFiles
    WHERE ? IS NULL
       OR LOWER(CONCAT(IFNULL(fname, ''), ' ', IFNULL(mname, ''), ' ', IFNULL(lname, ''))) LIKE ?
"#;

const FETCH_CUSTOMERS_SQL: &str = r#"
    SELECT
        CAST(id AS SIGNED) AS id,
        CAST(fname AS CHAR) AS fname,
        CAST(mname AS CHAR) AS mname,
        CAST(lname AS CHAR) AS lname,
        CAST(address AS CHAR) AS address,
        CAST(address2 AS CHAR) AS address2,
        CAST(CITY AS CHAR) AS CITY,
        CAST(ST AS CHAR) AS ST,
        CAST(ZIP AS CHAR) AS ZIP,
        CAST(MAIL_DATE AS CHAR) AS MAIL_DATE,
        CAST(MAIL_CLASS AS CHAR) AS MAIL_CLASS,
        CAST(EXP_DATE AS CHAR) AS EXP_DATE,
        CAST(INHOME_DATE AS CHAR) AS INHOME_DATE,
        CAST(CLIENT AS CHAR) AS CLIENT,
        CAST(csv_filename AS CHAR) AS csv_filename,
        CAST(age AS SIGNED) AS age,
        CAST(vantage AS SIGNED) AS vantage,
        CAST(utilization AS DOUBLE) AS utilization,
        CAST(debt AS DECIMAL(20, 2)) AS debt,
        CAST(selection_grp AS CHAR) AS selection_grp,
        CAST(rev_debt AS DECIMAL(20, 2)) AS rev_debt,
        CAST(unsecured_debt AS DECIMAL(20, 2)) AS unsecured_debt,
        CAST(campaign_id AS CHAR) AS campaign_id
    FROM KuberFinalMailFiles
    WHERE ? IS NULL
       OR LOWER(CONCAT(IFNULL(fname, ''), ' ', IFNULL(mname, ''), ' ', IFNULL(lname, ''))) LIKE ?
    ORDER BY id
    LIMIT ? OFFSET ?
"#;

// A NULL csv_filename forms its own group, so count groups rather than
// COUNT(DISTINCT csv_filename).
const COUNT_CAMPAIGNS_SQL: &str = r#"
    SELECT COUNT(*)
    FROM (SELECT 1 FROM KuberFinalMailFiles GROUP BY csv_filename) AS campaigns
"#;

const FETCH_CAMPAIGN_STATS_SQL: &str = r#"
    SELECT
        CAST(csv_filename AS CHAR) AS campaign_id,
        COUNT(*) AS record_count,
        CAST(AVG(age) AS DOUBLE) AS avg_age,
        CAST(AVG(vantage) AS DOUBLE) AS avg_score,
        CAST(AVG(utilization) AS DOUBLE) AS avg_utilization,
        CAST(SUM(debt) AS DECIMAL(20, 2)) AS total_debt,
        COUNT(CASE WHEN vantage < 600 THEN 1 END) AS score_below_600,
        COUNT(CASE WHEN vantage >= 600 AND vantage < 700 THEN 1 END) AS score_600_700,
        COUNT(CASE WHEN vantage >= 700 THEN 1 END) AS score_700_plus
    FROM KuberFinalMailFiles
    GROUP BY csv_filename
    ORDER BY csv_filename
    LIMIT ? OFFSET ?
"#;

const DASHBOARD_STATS_SQL: &str = r#"
    SELECT
        COUNT(*) AS total_rows,
        CAST(AVG(age) AS DOUBLE) AS avg_age,
        CAST(AVG(vantage) AS DOUBLE) AS avg_score,
        CAST(AVG(utilization) AS DOUBLE) AS avg_utilization,
        CAST(SUM(debt) AS DECIMAL(20, 2)) AS total_debt,
        CAST(SUM(debt) / NULLIF(COUNT(*), 0) AS DOUBLE) AS avg_debt,
        CAST(MIN(vantage) AS SIGNED) AS min_score,
        CAST(MAX(vantage) AS SIGNED) AS max_score,
        COUNT(CASE WHEN age <= 30 THEN 1 END) AS age_up_to_30,
        COUNT(CASE WHEN age > 30 AND age <= 45 THEN 1 END) AS age_31_45,
        COUNT(CASE WHEN age > 45 AND age <= 60 THEN 1 END) AS age_46_60,
        COUNT(CASE WHEN age > 60 THEN 1 END) AS age_over_60,
        COUNT(age) AS age_bucketed_rows,
        COUNT(CASE WHEN vantage < 600 THEN 1 END) AS score_below_600,
        COUNT(CASE WHEN vantage >= 600 AND vantage < 700 THEN 1 END) AS score_600_700,
        COUNT(CASE WHEN vantage >= 700 THEN 1 END) AS score_700_plus
    FROM KuberFinalMailFiles
"#;

const ADDRESS_SAMPLE_SQL: &str = r#"
    SELECT
        CAST(id AS SIGNED) AS id,
        CAST(address AS CHAR) AS address,
        CAST(CITY AS CHAR) AS city,
        CAST(ST AS CHAR) AS state,
        CAST(ZIP AS CHAR) AS zip
    FROM KuberFinalMailFiles
    ORDER BY id
    LIMIT ?
"#;

/// Turns a user search term into a LIKE pattern that matches it literally.
///
/// Lowercased to pair with `LOWER(...)` on the column side; `\`, `%` and `_`
/// are escaped with MySQL's default escape character.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// MySQL-backed [`ReportStore`].
#[derive(Clone)]
pub struct ReportStorage {
    pool: MySqlPool,
    query_timeout: Duration,
}

impl ReportStorage {
    pub fn new(pool: MySqlPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Runs a query under the per-query timeout.
    ///
    /// Dropping the query future on timeout returns its connection to the pool.
    async fn timed<T, F>(&self, operation: &'static str, query: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result.context(operation),
            Err(_) => {
                tracing::error!(
                    "{} exceeded query timeout of {:?}",
                    operation,
                    self.query_timeout
                );
                Err(AppError::QueryTimeout(operation.to_string()))
            }
        }
    }
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl ReportStore for ReportStorage {
    async fn count_customers(&self, search: Option<&str>) -> Result<u64, AppError> {
        let pattern = search.map(like_pattern);
        let total: i64 = self
            .timed(
                "count_customers",
                sqlx::query_scalar::<_, i64>(COUNT_CUSTOMERS_SQL)
                    .bind(pattern.as_deref())
                    .bind(pattern.as_deref())
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(to_count(total))
    }

    async fn fetch_customers(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CustomerRecord>, AppError> {
        let pattern = search.map(like_pattern);
        self.timed(
            "fetch_customers",
            sqlx::query_as::<_, CustomerRecord>(FETCH_CUSTOMERS_SQL)
                .bind(pattern.as_deref())
                .bind(pattern.as_deref())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn count_campaigns(&self) -> Result<u64, AppError> {
        let total: i64 = self
            .timed(
                "count_campaigns",
                sqlx::query_scalar::<_, i64>(COUNT_CAMPAIGNS_SQL).fetch_one(&self.pool),
            )
            .await?;

        Ok(to_count(total))
    }

    async fn fetch_campaign_stats(
        &self,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CampaignAggregate>, AppError> {
        self.timed(
            "fetch_campaign_stats",
            sqlx::query_as::<_, CampaignAggregate>(FETCH_CAMPAIGN_STATS_SQL)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn dashboard_stats(&self) -> Result<DashboardAggregate, AppError> {
        self.timed(
            "dashboard_stats",
            sqlx::query_as::<_, DashboardAggregate>(DASHBOARD_STATS_SQL).fetch_one(&self.pool),
        )
        .await
    }

    async fn address_sample(&self, limit: u32) -> Result<Vec<AddressRow>, AppError> {
        self.timed(
            "address_sample",
            sqlx::query_as::<_, AddressRow>(ADDRESS_SAMPLE_SQL)
                .bind(limit)
                .fetch_all(&self.pool),
        )
        .await
    }
}
