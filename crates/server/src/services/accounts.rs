use quoteworks_core::domain::settings::{CompanySettings, SettingsUpdate};
use quoteworks_core::domain::user::{NewUser, Role, User, UserId, UserPatch};
use quoteworks_core::errors::ApplicationError;
use tracing::info;

use crate::identity::RequestContext;
use crate::state::AppState;

type ServiceResult<T> = Result<T, ApplicationError>;

pub async fn list_users(state: &AppState, ctx: &RequestContext) -> ServiceResult<Vec<User>> {
    ctx.actor.require_admin()?;
    Ok(state.users.list().await?)
}

pub async fn get_user(state: &AppState, ctx: &RequestContext, id: UserId) -> ServiceResult<User> {
    ctx.actor.require_admin()?;
    find_user(state, id).await
}

pub async fn create_user(
    state: &AppState,
    ctx: &RequestContext,
    user: NewUser,
) -> ServiceResult<User> {
    ctx.actor.require_admin()?;
    let created = state.users.create(user).await?;
    info!(
        event_name = "account.user_created",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        user_id = %created.id,
        role = created.role.as_str(),
        "user created"
    );
    Ok(created)
}

pub async fn update_user(
    state: &AppState,
    ctx: &RequestContext,
    id: UserId,
    patch: UserPatch,
) -> ServiceResult<User> {
    ctx.actor.require_admin()?;
    Ok(state.users.update_profile(id, patch).await?)
}

/// Fails with a conflict when an admin targets their own account.
pub async fn change_role(
    state: &AppState,
    ctx: &RequestContext,
    id: UserId,
    role: Role,
) -> ServiceResult<User> {
    ctx.actor.require_admin()?;
    if id == ctx.actor.user_id {
        return Err(ApplicationError::Conflict(
            "administrators cannot change their own role".to_string(),
        ));
    }
    let updated = state.users.update_role(id, role).await?;
    info!(
        event_name = "account.role_changed",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        user_id = %id,
        role = role.as_str(),
        "user role changed"
    );
    Ok(updated)
}

pub async fn delete_user(state: &AppState, ctx: &RequestContext, id: UserId) -> ServiceResult<()> {
    ctx.actor.require_admin()?;
    if id == ctx.actor.user_id {
        return Err(ApplicationError::Conflict(
            "administrators cannot delete themselves".to_string(),
        ));
    }
    state.users.delete(id).await?;
    info!(
        event_name = "account.user_deleted",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        user_id = %id,
        "user deleted"
    );
    Ok(())
}

pub async fn me(state: &AppState, ctx: &RequestContext) -> ServiceResult<User> {
    find_user(state, ctx.actor.user_id).await
}

pub async fn update_profile(
    state: &AppState,
    ctx: &RequestContext,
    patch: UserPatch,
) -> ServiceResult<User> {
    Ok(state.users.update_profile(ctx.actor.user_id, patch).await?)
}

pub async fn settings(state: &AppState, ctx: &RequestContext) -> ServiceResult<CompanySettings> {
    ctx.actor.require_admin()?;
    Ok(state.settings.get().await?)
}

pub async fn update_settings(
    state: &AppState,
    ctx: &RequestContext,
    update: SettingsUpdate,
) -> ServiceResult<CompanySettings> {
    ctx.actor.require_admin()?;
    let group = settings_group(&update);
    let settings = state.settings.update(update).await?;
    info!(
        event_name = "settings.updated",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        group,
        "company settings updated"
    );
    Ok(settings)
}

fn settings_group(update: &SettingsUpdate) -> &'static str {
    match update {
        SettingsUpdate::Company(_) => "company",
        SettingsUpdate::TaxRate(_) => "tax",
        SettingsUpdate::Currency(_) => "currency",
        SettingsUpdate::QuotationPrefix(_) => "quotation_prefix",
        SettingsUpdate::Terms(_) => "terms",
    }
}

async fn find_user(state: &AppState, id: UserId) -> ServiceResult<User> {
    state.users.find_by_id(id).await?.ok_or_else(|| ApplicationError::not_found("user", id))
}

#[cfg(test)]
mod tests {
    use quoteworks_core::domain::settings::SettingsUpdate;
    use quoteworks_core::domain::user::{NewUser, Role, UserPatch};
    use quoteworks_core::errors::{ApplicationError, DomainError};

    use super::{change_role, create_user, delete_user, me, update_profile, update_settings};
    use crate::test_support::Harness;

    #[tokio::test]
    async fn only_admins_manage_users() {
        let harness = Harness::new().await;
        let user = NewUser {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            contact: String::new(),
            role: Role::User,
        };

        let error = create_user(&harness.state, &harness.user_ctx(), user.clone())
            .await
            .expect_err("forbidden");
        assert!(matches!(error, ApplicationError::Forbidden(_)));

        let created = create_user(&harness.state, &harness.admin_ctx(), user).await.expect("admin");
        let promoted = change_role(&harness.state, &harness.admin_ctx(), created.id, Role::Admin)
            .await
            .expect("promote");
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn admins_cannot_demote_or_delete_themselves() {
        let harness = Harness::new().await;
        let admin = harness.admin_ctx();

        let demote = change_role(&harness.state, &admin, harness.admin.id, Role::User)
            .await
            .expect_err("self demotion");
        assert!(matches!(demote, ApplicationError::Conflict(_)));

        let remove =
            delete_user(&harness.state, &admin, harness.admin.id).await.expect_err("self delete");
        assert!(matches!(remove, ApplicationError::Conflict(_)));
    }

    #[tokio::test]
    async fn profile_update_keeps_the_role() {
        let harness = Harness::new().await;
        let ctx = harness.user_ctx();

        let updated = update_profile(
            &harness.state,
            &ctx,
            UserPatch { contact: Some("555-0142".to_string()), ..Default::default() },
        )
        .await
        .expect("update");
        assert_eq!(updated.contact, "555-0142");
        assert_eq!(updated.role, Role::User);
        assert_eq!(me(&harness.state, &ctx).await.expect("me").contact, "555-0142");
    }

    #[tokio::test]
    async fn settings_are_admin_only_and_validated() {
        let harness = Harness::new().await;

        let forbidden = update_settings(
            &harness.state,
            &harness.user_ctx(),
            SettingsUpdate::Currency("EUR".to_string()),
        )
        .await
        .expect_err("forbidden");
        assert!(matches!(forbidden, ApplicationError::Forbidden(_)));

        let invalid = update_settings(
            &harness.state,
            &harness.admin_ctx(),
            SettingsUpdate::QuotationPrefix("Q T".to_string()),
        )
        .await
        .expect_err("invalid prefix");
        assert!(matches!(invalid, ApplicationError::Domain(DomainError::Validation(_))));
    }
}
