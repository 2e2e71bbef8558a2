/// Reporting logic shared by the HTTP handlers
///
/// Turns the raw store primitives into the dashboard's read models:
/// 1. Paginated, search-filtered customer listing
/// 2. Paginated per-campaign aggregates
/// 3. Global dashboard aggregate
/// 4. Address sample placed on the map via the coordinate resolver
use std::sync::Arc;

use crate::db_storage::ReportStore;
use crate::errors::{AppError, ResultExt};
use crate::geocoding::{fallback_coordinate, CoordinateResolver, PostalCode};
use crate::models::{
    AddressPoint, CampaignAggregate, CustomerRecord, DashboardAggregate, Paginated,
};
use crate::pagination::PageRequest;

/// Rows sampled for the heatmap.
pub const ADDRESS_SAMPLE_LIMIT: u32 = 500;

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    resolver: Arc<CoordinateResolver>,
}

impl ReportService {
    pub fn new(store: Arc<dyn ReportStore>, resolver: Arc<CoordinateResolver>) -> Self {
        Self { store, resolver }
    }

    pub async fn list_customers(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Paginated<CustomerRecord>, AppError> {
        let search = search.filter(|s| !s.is_empty());
        tracing::info!(
            "list_customers page={} limit={} search={:?}",
            page.page,
            page.limit,
            search
        );

        let total = self
            .store
            .count_customers(search)
            .await
            .context("list_customers")?;
        let data = self
            .store
            .fetch_customers(search, page.limit, page.offset())
            .await
            .context("list_customers")?;

        Ok(Paginated {
            data,
            pagination: page.paginate(total),
        })
    }

    pub async fn list_campaign_stats(
        &self,
        page: PageRequest,
    ) -> Result<Paginated<CampaignAggregate>, AppError> {
        tracing::info!(
            "list_campaign_stats page={} limit={}",
            page.page,
            page.limit
        );

        let total = self
            .store
            .count_campaigns()
            .await
            .context("list_campaign_stats")?;
        let data = self
            .store
            .fetch_campaign_stats(page.limit, page.offset())
            .await
            .context("list_campaign_stats")?;

        Ok(Paginated {
            data,
            pagination: page.paginate(total),
        })
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardAggregate, AppError> {
        let stats = self
            .store
            .dashboard_stats()
            .await
            .context("dashboard_stats")?;

        tracing::debug!(
            "Dashboard stats: {} rows, vantage range {:?}..{:?}",
            stats.total_rows,
            stats.min_score,
            stats.max_score
        );
        if stats.age_bucketed_rows != stats.total_rows {
            tracing::debug!(
                "{} rows have no age and fall outside every age bucket",
                stats.total_rows - stats.age_bucketed_rows
            );
        }

        Ok(stats)
    }

    /// Samples addresses and attaches an approximate coordinate to each.
    ///
    /// Postal codes are resolved once per distinct code and back-filled.
    pub async fn address_points(&self) -> Result<Vec<AddressPoint>, AppError> {
        let rows = self
            .store
            .address_sample(ADDRESS_SAMPLE_LIMIT)
            .await
            .context("address_points")?;

        let resolved = self
            .resolver
            .resolve_many(rows.iter().map(|row| row.zip.as_deref()))
            .await;

        let points = rows
            .into_iter()
            .map(|row| {
                let code = PostalCode::parse(row.zip.as_deref());
                let coord = resolved
                    .get(&code)
                    .copied()
                    .unwrap_or_else(|| fallback_coordinate(&code));
                AddressPoint {
                    id: row.id,
                    address: row.address,
                    city: row.city,
                    state: row.state,
                    zip: row.zip,
                    lat: coord.lat,
                    lng: coord.lng,
                }
            })
            .collect();

        Ok(points)
    }
}
