use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

// ============ Database Models ============

/// A row of `KuberFinalMailFiles`.
///
/// Field names on the wire match the table's column names, which is what the
/// dashboard UI reads.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct CustomerRecord {
    pub id: i64,
    pub fname: Option<String>,
    pub mname: Option<String>,
    pub lname: Option<String>,
    pub address: Option<String>,
    pub address2: Option<String>,
    #[serde(rename = "CITY")]
    #[sqlx(rename = "CITY")]
    pub city: Option<String>,
    #[serde(rename = "ST")]
    #[sqlx(rename = "ST")]
    pub state: Option<String>,
    #[serde(rename = "ZIP")]
    #[sqlx(rename = "ZIP")]
    pub zip: Option<String>,
    #[serde(rename = "MAIL_DATE")]
    #[sqlx(rename = "MAIL_DATE")]
    pub mail_date: Option<String>,
    #[serde(rename = "MAIL_CLASS")]
    #[sqlx(rename = "MAIL_CLASS")]
    pub mail_class: Option<String>,
    #[serde(rename = "EXP_DATE")]
    #[sqlx(rename = "EXP_DATE")]
    pub exp_date: Option<String>,
    #[serde(rename = "INHOME_DATE")]
    #[sqlx(rename = "INHOME_DATE")]
    pub inhome_date: Option<String>,
    #[serde(rename = "CLIENT")]
    #[sqlx(rename = "CLIENT")]
    pub client: Option<String>,
    /// Campaign tag: the source file the record was loaded from.
    pub csv_filename: Option<String>,
    pub age: Option<i64>,
    /// Vantage credit score.
    pub vantage: Option<i64>,
    /// Utilization percentage.
    pub utilization: Option<f64>,
    #[schema(value_type = Option<String>)]
    pub debt: Option<BigDecimal>,
    pub selection_grp: Option<String>,
    #[schema(value_type = Option<String>)]
    pub rev_debt: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub unsecured_debt: Option<BigDecimal>,
    pub campaign_id: Option<String>,
}

impl CustomerRecord {
    /// First, middle and last name joined the same way the search predicate
    /// joins them in SQL.
    pub fn search_name(&self) -> String {
        format!(
            "{} {} {}",
            self.fname.as_deref().unwrap_or(""),
            self.mname.as_deref().unwrap_or(""),
            self.lname.as_deref().unwrap_or("")
        )
    }
}

/// Aggregate statistics for one campaign (`csv_filename` group).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignAggregate {
    #[serde(rename = "csv_filename")]
    pub campaign_id: Option<String>,
    #[serde(rename = "count")]
    pub record_count: i64,
    pub avg_age: Option<f64>,
    #[serde(rename = "avgVantage")]
    pub avg_score: Option<f64>,
    pub avg_utilization: Option<f64>,
    #[schema(value_type = Option<String>)]
    pub total_debt: Option<BigDecimal>,
    /// Records scoring below 600.
    #[serde(rename = "range500_600")]
    pub score_below_600: i64,
    /// Records scoring 600 up to (not including) 700.
    #[serde(rename = "range600_700")]
    pub score_600_700: i64,
    /// Records scoring 700 or more.
    #[serde(rename = "range700Plus")]
    pub score_700_plus: i64,
}

/// Global statistics across every row of the table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAggregate {
    pub total_rows: i64,
    pub avg_age: Option<f64>,
    #[serde(rename = "avgVantage")]
    pub avg_score: Option<f64>,
    pub avg_utilization: Option<f64>,
    #[schema(value_type = Option<String>)]
    pub total_debt: Option<BigDecimal>,
    /// `total_debt / total_rows`.
    pub avg_debt: Option<f64>,
    #[serde(rename = "minVantage")]
    pub min_score: Option<i64>,
    #[serde(rename = "maxVantage")]
    pub max_score: Option<i64>,
    #[serde(rename = "age18_30")]
    pub age_up_to_30: i64,
    #[serde(rename = "age31_45")]
    pub age_31_45: i64,
    #[serde(rename = "age46_60")]
    pub age_46_60: i64,
    #[serde(rename = "age60Plus")]
    pub age_over_60: i64,
    /// Rows that landed in one of the age buckets (rows with an age).
    pub age_bucketed_rows: i64,
    #[serde(rename = "vantage500_600")]
    pub score_below_600: i64,
    #[serde(rename = "vantage600_700")]
    pub score_600_700: i64,
    #[serde(rename = "vantage700Plus")]
    pub score_700_plus: i64,
}

/// The subset of a row needed to place it on the heatmap.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AddressRow {
    pub id: i64,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// An address with its approximate coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddressPoint {
    pub id: i64,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

// ============ API Models ============

/// Pagination block attached to every paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[aliases(CustomerPage = Paginated<CustomerRecord>, CampaignPage = Paginated<CampaignAggregate>)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Query parameters for `GET /api/customers`.
///
/// Kept as raw strings so that malformed numbers fall back to defaults
/// instead of being rejected by the extractor.
#[derive(Debug, Default, PartialEq, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerQueryParams {
    /// 1-based page number (default 1).
    pub page: Option<String>,
    /// Page size (default 50, capped by `MAX_PAGE_SIZE`).
    pub limit: Option<String>,
    /// Case-insensitive substring of the customer's full name.
    pub search: Option<String>,
}

/// Query parameters for `GET /api/campaigns`.
#[derive(Debug, Default, PartialEq, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CampaignQueryParams {
    /// 1-based page number (default 1).
    pub page: Option<String>,
    /// Page size (default 20, capped by `MAX_PAGE_SIZE`).
    pub limit: Option<String>,
}

/// First value of `key` in a decoded query string. Repeated keys keep the
/// first occurrence.
fn first_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

impl CustomerQueryParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            page: first_value(pairs, "page"),
            limit: first_value(pairs, "limit"),
            search: first_value(pairs, "search"),
        }
    }
}

impl CampaignQueryParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            page: first_value(pairs, "page"),
            limit: first_value(pairs, "limit"),
        }
    }
}
