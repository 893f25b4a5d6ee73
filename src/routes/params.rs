use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Pagination fields are inlined rather than `#[serde(flatten)]`ed: flattening
/// forces serde_urlencoded through its buffered deserializer, which cannot
/// produce `Option<i64>`, so a URL like `?page=1` would be rejected at
/// extraction.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::Query, http::Uri};

    use super::*;

    #[test]
    fn order_list_query_parses_paged_urls() {
        let uri: Uri = "/api/admin/orders?page=2&per_page=50&status=SHIPPED&sort_order=asc"
            .parse()
            .unwrap();
        let Query(query) = Query::<OrderListQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.page, Some(2));
        assert_eq!(query.per_page, Some(50));
        assert_eq!(query.status.as_deref(), Some("SHIPPED"));
        assert!(matches!(query.sort_order, Some(SortOrder::Asc)));
        assert_eq!(query.pagination().normalize(), (2, 50, 50));
    }

    #[test]
    fn order_list_query_defaults_when_params_are_absent() {
        let uri: Uri = "/api/admin/orders".parse().unwrap();
        let Query(query) = Query::<OrderListQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.pagination().normalize(), (1, 20, 0));
        assert!(query.status.is_none());
        assert!(query.sort_order.is_none());
    }
}
