use bharatmart_backend::state::AppState;
use bharatmart_db::models::Role;
use bharatmart_db::repo::users::{self, NewUser};

/// Provision an admin account from `ADMIN_EMAIL` / `ADMIN_PASSWORD` (or the
/// `admin` config section). An existing account with that email is promoted.
pub async fn maybe_provision_admin(
    state: &AppState,
    admin: &bharatmart_config::AdminConfig,
) -> anyhow::Result<()> {
    let email = match admin.email.as_deref() {
        Some(e) if !e.trim().is_empty() => e,
        _ => return Ok(()),
    };
    let password = match admin.password.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => {
            tracing::warn!("ADMIN_EMAIL set but ADMIN_PASSWORD missing; skipping admin provisioning");
            return Ok(());
        }
    };

    if let Some(existing) = users::find_by_email(state.db.as_ref(), email).await? {
        if existing.role == Role::Admin {
            tracing::info!(user_id = %existing.id, "admin already exists; skipping provisioning");
        } else {
            users::set_role(state.db.as_ref(), &existing.id, Role::Admin).await?;
            tracing::info!(user_id = %existing.id, "promoted existing user to admin");
        }
        return Ok(());
    }

    let password_hash = state
        .hasher
        .hash(password)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let user = users::create(
        state.db.as_ref(),
        NewUser {
            email: email.to_owned(),
            password_hash,
            role: Role::Admin,
            full_name: Some("Administrator".into()),
            phone: None,
            address: None,
        },
    )
    .await?;
    tracing::info!(user_id = %user.id, "provisioned initial admin user");
    Ok(())
}
