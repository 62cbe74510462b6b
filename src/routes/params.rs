use serde::Deserialize;
use utoipa::ToSchema;

use crate::{models::OrderStatus, stores::OrderFilter};

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

// Flattening `Pagination` here would make the query decoder see page numbers as strings.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    /// Store filter plus the normalized `(page, per_page)` for the response meta.
    pub fn to_filter(&self) -> (OrderFilter, i64, i64) {
        let pagination = Pagination {
            page: self.page,
            per_page: self.per_page,
        };
        let (page, limit, offset) = pagination.normalize();
        let filter = OrderFilter {
            status: self.status,
            oldest_first: matches!(self.sort_order, Some(SortOrder::Asc)),
            limit: limit as u64,
            offset: offset as u64,
        };
        (filter, page, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let query = OrderListQuery {
            page: Some(0),
            per_page: Some(500),
            ..Default::default()
        };
        let (filter, page, limit) = query.to_filter();
        assert_eq!(page, 1);
        assert_eq!(limit, 100);
        assert_eq!(filter.offset, 0);
        assert!(!filter.oldest_first);
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let query = OrderListQuery {
            page: Some(i64::MAX),
            per_page: Some(100),
            ..Default::default()
        };
        let (filter, page, limit) = query.to_filter();
        assert_eq!(page, i64::MAX);
        assert_eq!(limit, 100);
        assert_eq!(filter.offset, i64::MAX as u64);
    }

    #[test]
    fn third_page_skips_two_pages() {
        let query = OrderListQuery {
            page: Some(3),
            per_page: Some(10),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        let (filter, _, _) = query.to_filter();
        assert_eq!(filter.offset, 20);
        assert_eq!(filter.limit, 10);
        assert!(filter.oldest_first);
    }
}
