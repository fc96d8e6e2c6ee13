//! Product catalogue. Reads go through the cache; every admin write drops
//! all `products:*` keys.

pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod update;

use bharatmart_db::repo::products::ProductQuery;

use crate::state::AppState;

pub const CACHE_PATTERN: &str = "products:*";
/// TTL used when the cache has no configured default.
pub const CACHE_TTL_SECS: u64 = 300;

pub fn list_cache_key(query: &ProductQuery) -> String {
    format!(
        "products:list:category={}:sort={}:order={}:limit={}:offset={}",
        query.category.as_deref().unwrap_or(""),
        query.sort.as_deref().unwrap_or("created_at"),
        query.order.as_deref().unwrap_or("asc"),
        query.limit.map(|l| l.to_string()).unwrap_or_default(),
        query.offset.unwrap_or(0),
    )
}

pub fn item_cache_key(id: &str) -> String {
    format!("products:item:{id}")
}

pub(crate) fn cache_ttl(state: &AppState) -> Option<u64> {
    Some(state.cache.default_ttl().unwrap_or(CACHE_TTL_SECS))
}

pub(crate) async fn invalidate(state: &AppState) {
    let removed = state.cache.invalidate_pattern(CACHE_PATTERN).await;
    tracing::debug!(removed, "product cache invalidated");
}

pub use create::create;
pub use delete::delete;
pub use get::get;
pub use list::list;
pub use update::update;
