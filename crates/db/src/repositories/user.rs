use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use quoteworks_core::domain::user::{normalize_email, NewUser, Role, User, UserId, UserPatch};

use super::{now_rfc3339, timestamp_column, RepositoryError, UserRepository};
use crate::DbPool;

const USER_COLUMNS: &str = "id, name, email, contact, role, created_at, updated_at";

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        contact: row.try_get("contact")?,
        role: Role::from_str(&role)
            .map_err(|_| RepositoryError::Decode(format!("unknown role `{role}`")))?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

impl SqlUserRepository {
    async fn fetch(&self, id: UserId) -> Result<User, RepositoryError> {
        self.find_by_id(id).await?.ok_or_else(|| RepositoryError::not_found("user", id))
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query(&sql).bind(id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row =
            sqlx::query(&sql).bind(normalize_email(email)).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        user.validate()?;
        let now = now_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (name, email, contact, role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user.name.trim())
        .bind(normalize_email(&user.email))
        .bind(&user.contact)
        .bind(user.role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.fetch(UserId(result.last_insert_rowid())).await
    }

    async fn update_profile(&self, id: UserId, patch: UserPatch) -> Result<User, RepositoryError> {
        patch.validate()?;
        let mut user = self.fetch(id).await?;
        patch.apply_to(&mut user);

        sqlx::query("UPDATE users SET name = ?, email = ?, contact = ?, updated_at = ? WHERE id = ?")
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.contact)
            .bind(now_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        self.fetch(id).await
    }

    async fn update_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(now_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("user", id));
        }
        self.fetch(id).await
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let owned: i64 = sqlx::query("SELECT COUNT(*) AS owned FROM quotations WHERE owner_id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?
            .try_get("owned")?;
        if owned > 0 {
            return Err(RepositoryError::Conflict(format!(
                "user {id} owns {owned} quotation(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM users WHERE id = ?").bind(id.0).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("user", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quoteworks_core::domain::quotation::NewQuotation;
    use quoteworks_core::domain::user::{NewUser, Role, UserPatch};

    use super::SqlUserRepository;
    use crate::repositories::{
        QuotationRepository, RepositoryError, SqlQuotationRepository, UserRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Robin".to_string(),
            email: email.to_string(),
            contact: "555-0100".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn create_normalizes_email_and_finds_by_it() {
        let repo = SqlUserRepository::new(setup().await);
        let created = repo.create(new_user("Robin@Example.COM")).await.expect("create");

        assert_eq!(created.email, "robin@example.com");
        let found = repo.find_by_email("ROBIN@example.com").await.expect("find").expect("exists");
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let repo = SqlUserRepository::new(setup().await);
        repo.create(new_user("robin@example.com")).await.expect("create");

        let error = repo.create(new_user("robin@example.com")).await.expect_err("duplicate");
        assert!(error.is_unique_violation());
    }

    #[tokio::test]
    async fn role_and_profile_updates_are_independent() {
        let repo = SqlUserRepository::new(setup().await);
        let created = repo.create(new_user("robin@example.com")).await.expect("create");

        let promoted = repo.update_role(created.id, Role::Admin).await.expect("promote");
        assert_eq!(promoted.role, Role::Admin);

        let patch = UserPatch { contact: Some("555-0199".to_string()), ..Default::default() };
        let updated = repo.update_profile(created.id, patch).await.expect("profile");
        assert_eq!(updated.contact, "555-0199");
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn user_owning_quotations_cannot_be_deleted() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool.clone());
        let owner = repo.create(new_user("robin@example.com")).await.expect("create");
        SqlQuotationRepository::new(pool)
            .create(
                owner.id,
                NewQuotation { title: "Desk".to_string(), ..Default::default() },
                "QT",
                None,
            )
            .await
            .expect("quotation");

        let error = repo.delete(owner.id).await.expect_err("owner");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        let other = repo.create(new_user("sam@example.com")).await.expect("create other");
        repo.delete(other.id).await.expect("delete");
        assert!(repo.find_by_id(other.id).await.expect("find").is_none());
    }
}
