use serde_json::json;
use tracing::info;

use super::{is_unique_violation, record, RepoError, RepoResult};
use crate::adapter::DatabaseAdapter;
use crate::error::DbResult;
use crate::models::{from_record, Role, User};
use crate::types::{Record, SelectOptions};

const TABLE: &str = "users";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Emails are compared case-insensitively by storing them lowercased.
#[inline]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub async fn find_by_email(db: &dyn DatabaseAdapter, email: &str) -> DbResult<Option<User>> {
    let rows = db
        .select(
            TABLE,
            &SelectOptions::new()
                .filter("email", normalize_email(email))
                .limit(1),
        )
        .await?;
    rows.into_iter().next().map(from_record).transpose()
}

pub async fn find_by_id(db: &dyn DatabaseAdapter, id: &str) -> DbResult<Option<User>> {
    let rows = db
        .select(TABLE, &SelectOptions::new().filter("id", id).limit(1))
        .await?;
    rows.into_iter().next().map(from_record).transpose()
}

/// Create a user. A second account with the same email is rejected and
/// nothing is written.
pub async fn create(db: &dyn DatabaseAdapter, new: NewUser) -> RepoResult<User> {
    let email = normalize_email(&new.email);
    if email.is_empty() {
        return Err(RepoError::Invalid("email is required".into()));
    }
    if find_by_email(db, &email).await?.is_some() {
        return Err(RepoError::Conflict("user already exists".into()));
    }

    let values = record(json!({
        "email": email,
        "password": new.password_hash,
        "role": new.role,
        "full_name": new.full_name,
        "phone": new.phone,
        "address": new.address,
    }));

    let row = match db.insert(TABLE, values).await {
        Ok(row) => row,
        // Lost a race with a concurrent signup.
        Err(e) if is_unique_violation(&e) => {
            return Err(RepoError::Conflict("user already exists".into()))
        }
        Err(e) => return Err(e.into()),
    };
    let user: User = from_record(row.ok_or_else(|| RepoError::NotFound("user".into()))?)?;
    info!(user_id = %user.id, role = %user.role, "user created");
    Ok(user)
}

pub async fn update_profile(
    db: &dyn DatabaseAdapter,
    id: &str,
    patch: ProfilePatch,
) -> RepoResult<Option<User>> {
    let mut record = Record::new();
    if let Some(v) = patch.full_name {
        record.insert("full_name".into(), v.into());
    }
    if let Some(v) = patch.phone {
        record.insert("phone".into(), v.into());
    }
    if let Some(v) = patch.address {
        record.insert("address".into(), v.into());
    }
    if record.is_empty() {
        return Ok(find_by_id(db, id).await?);
    }
    let row = db.update(TABLE, id, record).await?;
    Ok(row.map(from_record).transpose()?)
}

pub async fn set_password(db: &dyn DatabaseAdapter, id: &str, password_hash: &str) -> DbResult<bool> {
    let mut record = Record::new();
    record.insert("password".into(), password_hash.into());
    Ok(db.update(TABLE, id, record).await?.is_some())
}

pub async fn set_role(db: &dyn DatabaseAdapter, id: &str, role: Role) -> DbResult<Option<User>> {
    let mut record = Record::new();
    record.insert("role".into(), role.as_str().into());
    db.update(TABLE, id, record).await?.map(from_record).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::memory_db;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::Customer,
            full_name: Some("Asha".into()),
            phone: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected_without_a_second_row() {
        let db = memory_db().await;
        create(db.as_ref(), new_user("asha@example.com")).await.unwrap();
        let err = create(db.as_ref(), new_user("ASHA@example.com ")).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));

        let rows = db.select("users", &SelectOptions::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn lookups_and_profile_updates() {
        let db = memory_db().await;
        let user = create(db.as_ref(), new_user("ravi@example.com")).await.unwrap();
        assert_eq!(user.role, Role::Customer);

        let found = find_by_email(db.as_ref(), "Ravi@Example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(find_by_id(db.as_ref(), "nope").await.unwrap().is_none());

        let updated = update_profile(
            db.as_ref(),
            &user.id,
            ProfilePatch {
                phone: Some("+91 98765 43210".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("+91 98765 43210"));
        assert_eq!(updated.full_name.as_deref(), Some("Asha"));

        let admin = set_role(db.as_ref(), &user.id, Role::Admin).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
    }
}
