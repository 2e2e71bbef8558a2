//! In-memory `ReportStore` used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use std::str::FromStr;

use creditvision_dashboard::db_storage::ReportStore;
use creditvision_dashboard::errors::AppError;
use creditvision_dashboard::models::{
    AddressRow, CampaignAggregate, CustomerRecord, DashboardAggregate,
};

#[derive(Default)]
pub struct MemoryStore {
    pub rows: Vec<CustomerRecord>,
    /// When set, every call fails like a dropped connection.
    pub fail: bool,
}

impl MemoryStore {
    pub fn new(rows: Vec<CustomerRecord>) -> Self {
        Self { rows, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            rows: Vec::new(),
            fail: true,
        }
    }

    fn check(&self) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn matching(&self, search: Option<&str>) -> Vec<&CustomerRecord> {
        let needle = search.map(str::to_lowercase);
        self.rows
            .iter()
            .filter(|r| match &needle {
                Some(n) => r.search_name().to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect()
    }

    fn groups(&self) -> BTreeMap<Option<String>, Vec<&CustomerRecord>> {
        let mut groups: BTreeMap<Option<String>, Vec<&CustomerRecord>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.csv_filename.clone()).or_default().push(row);
        }
        groups
    }
}

fn avg(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / f64::from(n))
}

fn sum_debt<'a>(rows: impl Iterator<Item = &'a CustomerRecord>) -> Option<BigDecimal> {
    rows.filter_map(|r| r.debt.clone())
        .fold(None, |acc: Option<BigDecimal>, d| Some(acc.map_or(d.clone(), |a| a + d)))
}

fn count_where<'a>(
    rows: &[&'a CustomerRecord],
    pred: impl Fn(&CustomerRecord) -> bool,
) -> i64 {
    rows.iter().filter(|r| pred(r)).count() as i64
}

fn score_buckets(rows: &[&CustomerRecord]) -> (i64, i64, i64) {
    (
        count_where(rows, |r| r.vantage.is_some_and(|v| v < 600)),
        count_where(rows, |r| r.vantage.is_some_and(|v| (600..700).contains(&v))),
        count_where(rows, |r| r.vantage.is_some_and(|v| v >= 700)),
    )
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn count_customers(&self, search: Option<&str>) -> Result<u64, AppError> {
        self.check()?;
        Ok(self.matching(search).len() as u64)
    }

    async fn fetch_customers(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CustomerRecord>, AppError> {
        self.check()?;
        Ok(self
            .matching(search)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_campaigns(&self) -> Result<u64, AppError> {
        self.check()?;
        Ok(self.groups().len() as u64)
    }

    async fn fetch_campaign_stats(
        &self,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CampaignAggregate>, AppError> {
        self.check()?;
        Ok(self
            .groups()
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(campaign_id, rows)| {
                let (low, mid, high) = score_buckets(&rows);
                CampaignAggregate {
                    campaign_id,
                    record_count: rows.len() as i64,
                    avg_age: avg(rows.iter().filter_map(|r| r.age).map(|a| a as f64)),
                    avg_score: avg(rows.iter().filter_map(|r| r.vantage).map(|v| v as f64)),
                    avg_utilization: avg(rows.iter().filter_map(|r| r.utilization)),
                    total_debt: sum_debt(rows.iter().copied()),
                    score_below_600: low,
                    score_600_700: mid,
                    score_700_plus: high,
                }
            })
            .collect())
    }

    async fn dashboard_stats(&self) -> Result<DashboardAggregate, AppError> {
        self.check()?;
        let rows: Vec<&CustomerRecord> = self.rows.iter().collect();
        let (low, mid, high) = score_buckets(&rows);
        let total_debt = sum_debt(rows.iter().copied());
        let avg_debt = total_debt.as_ref().and_then(|d| {
            let total: f64 = d.to_string().parse().ok()?;
            (!rows.is_empty()).then(|| total / rows.len() as f64)
        });

        Ok(DashboardAggregate {
            total_rows: rows.len() as i64,
            avg_age: avg(rows.iter().filter_map(|r| r.age).map(|a| a as f64)),
            avg_score: avg(rows.iter().filter_map(|r| r.vantage).map(|v| v as f64)),
            avg_utilization: avg(rows.iter().filter_map(|r| r.utilization)),
            total_debt,
            avg_debt,
            min_score: rows.iter().filter_map(|r| r.vantage).min(),
            max_score: rows.iter().filter_map(|r| r.vantage).max(),
            age_up_to_30: count_where(&rows, |r| r.age.is_some_and(|a| a <= 30)),
            age_31_45: count_where(&rows, |r| r.age.is_some_and(|a| (31..=45).contains(&a))),
            age_46_60: count_where(&rows, |r| r.age.is_some_and(|a| (46..=60).contains(&a))),
            age_over_60: count_where(&rows, |r| r.age.is_some_and(|a| a > 60)),
            age_bucketed_rows: count_where(&rows, |r| r.age.is_some()),
            score_below_600: low,
            score_600_700: mid,
            score_700_plus: high,
        })
    }

    async fn address_sample(&self, limit: u32) -> Result<Vec<AddressRow>, AppError> {
        self.check()?;
        Ok(self
            .rows
            .iter()
            .take(limit as usize)
            .map(|r| AddressRow {
                id: r.id,
                address: r.address.clone(),
                city: r.city.clone(),
                state: r.state.clone(),
                zip: r.zip.clone(),
            })
            .collect())
    }
}

/// A customer row with the fields the tests care about.
pub fn customer(
    id: i64,
    name: (&str, Option<&str>, &str),
    campaign: &str,
    age: Option<i64>,
    vantage: Option<i64>,
    debt: &str,
) -> CustomerRecord {
    CustomerRecord {
        id,
        fname: Some(name.0.to_string()),
        mname: name.1.map(str::to_string),
        lname: Some(name.2.to_string()),
        address: Some(format!("{} Main St", id)),
        address2: None,
        city: Some("Springfield".to_string()),
        state: Some("IL".to_string()),
        zip: Some("62701".to_string()),
        mail_date: None,
        mail_class: None,
        exp_date: None,
        inhome_date: None,
        client: Some("KUBER".to_string()),
        csv_filename: Some(campaign.to_string()),
        age,
        vantage,
        utilization: Some(42.5),
        debt: Some(BigDecimal::from_str(debt).unwrap()),
        selection_grp: None,
        rev_debt: None,
        unsecured_debt: None,
        campaign_id: None,
    }
}

/// `n` rows spread over `campaigns` campaign files with varied ages and scores.
pub fn sample_rows(n: i64, campaigns: i64) -> Vec<CustomerRecord> {
    const FIRST: [&str; 5] = ["John", "Maria", "Ahmed", "Li", "Olga"];
    const LAST: [&str; 4] = ["Smith", "Garcia", "O'Neil", "Nguyen"];
    (1..=n)
        .map(|id| {
            let age = if id % 11 == 0 { None } else { Some(18 + (id * 7) % 70) };
            let vantage = if id % 13 == 0 {
                None
            } else {
                Some(300 + (id * 37) % 551)
            };
            customer(
                id,
                (
                    FIRST[(id % 5) as usize],
                    (id % 3 == 0).then_some("Lee"),
                    LAST[(id % 4) as usize],
                ),
                &format!("campaign_{:02}.csv", id % campaigns),
                age,
                vantage,
                &format!("{}.{:02}", 1000 + id * 3, id % 100),
            )
        })
        .collect()
}
