use sqlx::SqliteConnection;

use crate::db_types::SubscriptionPlan;

const PLAN_COLUMNS: &str = "plan_id, name, price, currency, duration_days, plan_type, lens_view_id, active";

pub async fn fetch_plan(plan_id: &str, conn: &mut SqliteConnection) -> Result<Option<SubscriptionPlan>, sqlx::Error> {
    let q = format!("SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE plan_id = $1");
    let plan = sqlx::query_as(&q).bind(plan_id).fetch_optional(conn).await?;
    Ok(plan)
}

pub async fn fetch_active_plans_for_lens(
    lens_view_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<SubscriptionPlan>, sqlx::Error> {
    let q = format!(
        "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE lens_view_id = $1 AND active = 1 \
         ORDER BY price ASC, id ASC"
    );
    let plans = sqlx::query_as(&q).bind(lens_view_id).fetch_all(conn).await?;
    Ok(plans)
}

/// Inserts the plan, or replaces every attribute of the existing plan with the same `plan_id`.
pub async fn upsert_plan(plan: &SubscriptionPlan, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO subscription_plans (
                plan_id, name, price, currency, duration_days, plan_type, lens_view_id, active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (plan_id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                currency = excluded.currency,
                duration_days = excluded.duration_days,
                plan_type = excluded.plan_type,
                lens_view_id = excluded.lens_view_id,
                active = excluded.active
        "#,
    )
    .bind(&plan.plan_id)
    .bind(&plan.name)
    .bind(plan.price)
    .bind(&plan.currency)
    .bind(plan.duration_days)
    .bind(&plan.plan_type)
    .bind(&plan.lens_view_id)
    .bind(plan.active)
    .execute(conn)
    .await?;
    Ok(())
}
