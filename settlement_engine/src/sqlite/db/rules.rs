use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::CommissionRule;

/// Fetches every active rule that could apply to an order touching the given products and
/// categories. Precedence between the candidates is decided by [`crate::rules::select_rule`], not
/// here; this query only narrows the set.
pub async fn active_candidates(
    product_ids: &[String],
    category_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRule>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM commission_rules WHERE active = TRUE AND (scope = 'Global'");
    if !product_ids.is_empty() {
        builder.push(" OR (scope = 'Product' AND scope_id IN (");
        let mut bindings = builder.separated(", ");
        for id in product_ids {
            bindings.push_bind(id.clone());
        }
        builder.push("))");
    }
    if !category_ids.is_empty() {
        builder.push(" OR (scope = 'Category' AND scope_id IN (");
        let mut bindings = builder.separated(", ");
        for id in category_ids {
            bindings.push_bind(id.clone());
        }
        builder.push("))");
    }
    builder.push(") ORDER BY id ASC");
    trace!("📇️ Executing query: {}", builder.sql());
    let rules = builder.build_query_as::<CommissionRule>().fetch_all(conn).await?;
    Ok(rules)
}
