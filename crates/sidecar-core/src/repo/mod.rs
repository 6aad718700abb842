// ── Repositories ─────────────────────────────────────────────────────────────
// One module per aggregate. Each wraps a `&Store` and exposes CRUD plus the
// small set of domain queries components need; nobody above this layer
// builds SQL.

pub mod budgets;
pub mod community_rules;
pub mod costs;
pub mod events;
pub mod overrides;
pub mod pricing;
pub mod rules;
pub mod settings;
pub mod tool_overrides;

pub use budgets::BudgetsRepository;
pub use community_rules::CommunityRulesRepository;
pub use costs::CostsRepository;
pub use events::EventsRepository;
pub use overrides::OverridesRepository;
pub use pricing::PricingRepository;
pub use rules::RulesRepository;
pub use settings::SettingsRepository;
pub use tool_overrides::ToolOverridesRepository;

/// Shared pagination parameters, validated once at the repository boundary.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> crate::error::SidecarResult<Self> {
        if page < 1 {
            return Err(crate::error::SidecarError::validation("page must be >= 1"));
        }
        if !(1..=100).contains(&page_size) {
            return Err(crate::error::SidecarError::validation(
                "page_size must be between 1 and 100",
            ));
        }
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> crate::error::SidecarResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(crate::error::SidecarError::validation(
                "order must be 'asc' or 'desc'",
            )),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A page of results plus the metadata needed to render pagination controls.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + pagination.page_size - 1) / pagination.page_size
        };
        Self {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages,
        }
    }
}
