use futures::TryStreamExt;
use juniper::graphql_object;
use tokio_postgres::Row;

use crate::{
    api::{Context, Id, err::{ApiResult, not_found}},
    db::{types::Key, util::dbargs},
    prelude::*,
};


/// A user of the app.
pub(crate) struct User {
    key: Key,
    name: String,
    email: String,
    password: String,
    dish_ids: Vec<Key>,
}

/// Data for creating a new user.
pub(crate) struct NewUser {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) password: String,
    pub(crate) dish_ids: Vec<Key>,
}

/// Partial update of a user. `None` fields are left untouched.
#[derive(Default)]
pub(crate) struct UserChanges {
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) password: Option<String>,
}

#[graphql_object(Context = Context)]
impl User {
    fn id(&self) -> Id {
        Id::user(self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn password(&self) -> &str {
        &self.password
    }

    /// The dishes owned by this user, as a list of dish IDs.
    fn dish_id(&self) -> Vec<Id> {
        self.dish_ids.iter().copied().map(Id::dish).collect()
    }
}

impl User {
    pub(crate) async fn load_all(context: &Context) -> ApiResult<Vec<Self>> {
        let users = context.db
            .query_raw(
                &format!("select {} from users", Self::COL_NAMES),
                dbargs![],
            )
            .await?
            .map_ok(Self::from_row)
            .try_collect()
            .await?;

        Ok(users)
    }

    pub(crate) async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        if let Some(key) = id.key_for(Id::USER_KIND) {
            Self::load_by_key(key, context).await
        } else {
            Ok(None)
        }
    }

    pub(crate) async fn load_by_key(key: Key, context: &Context) -> ApiResult<Option<Self>> {
        let result = context.db
            .query_opt(
                &format!("select {} from users where id = $1", Self::COL_NAMES),
                &[&key],
            )
            .await?
            .map(Self::from_row);

        Ok(result)
    }

    pub(crate) async fn create(user: NewUser, context: &Context) -> ApiResult<Self> {
        let row = context.db
            .query_one(
                &format!(
                    "insert into users (name, email, password, dish_ids) \
                        values ($1, $2, $3, $4) \
                        returning {}",
                    Self::COL_NAMES,
                ),
                &[&user.name, &user.email, &user.password, &user.dish_ids],
            )
            .await?;

        Ok(Self::from_row(row))
    }

    /// Applies the given partial update and returns the new state of the
    /// record.
    pub(crate) async fn update(id: Id, changes: UserChanges, context: &Context) -> ApiResult<Self> {
        let key = id.key_for(Id::USER_KIND)
            .ok_or_else(|| not_found!("user '{id}' does not exist"))?;

        let row = context.db
            .query_opt(
                &Self::update_sql(),
                &[&key, &changes.name, &changes.email, &changes.password],
            )
            .await?
            .ok_or_else(|| not_found!("user '{id}' does not exist"))?;

        Ok(Self::from_row(row))
    }

    /// Deletes the user and all dishes owned by them, in the same
    /// transaction. The user row goes first: if it doesn't exist, we bail
    /// before any dish is touched. (The transaction is committed even when a
    /// resolver errors, so the order matters: dishes may reference a
    /// nonexistent owner, and those must survive a failed `deleteUser`.)
    /// Returns the deleted user.
    pub(crate) async fn remove(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.key_for(Id::USER_KIND)
            .ok_or_else(|| not_found!("user '{id}' does not exist"))?;

        let [delete_user, delete_dishes] = Self::remove_statements();
        let row = context.db
            .query_opt(&delete_user, &[&key])
            .await?
            .ok_or_else(|| not_found!("user '{id}' does not exist"))?;

        let removed_dishes = context.db
            .execute(&delete_dishes, &[&key])
            .await?;
        if removed_dishes > 0 {
            debug!("Removed {removed_dishes} dishes owned by user {key:?}");
        }

        Ok(Self::from_row(row))
    }

    /// The partial-update statement. `coalesce` keeps the previous value for
    /// every argument passed as null; `dish_ids` is never touched here.
    fn update_sql() -> String {
        format!(
            "update users set \
                name = coalesce($2, name), \
                email = coalesce($3, email), \
                password = coalesce($4, password) \
                where id = $1 \
                returning {}",
            Self::COL_NAMES,
        )
    }

    /// The statements `remove` runs, in order. The first doubles as the
    /// existence check: it returns the deleted row, or nothing.
    fn remove_statements() -> [String; 2] {
        [
            format!("delete from users where id = $1 returning {}", Self::COL_NAMES),
            "delete from dishes where user_id = $1".into(),
        ]
    }

    const COL_NAMES: &'static str = "id, name, email, password, dish_ids";

    fn from_row(row: Row) -> Self {
        Self {
            key: row.get(0),
            name: row.get(1),
            email: row.get(2),
            password: row.get(3),
            dish_ids: row.get(4),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::User;

    #[test]
    fn col_names_match_row_mapping() {
        // `from_row` reads columns by position, so this order is load
        // bearing for every statement that selects or returns `COL_NAMES`.
        let cols = User::COL_NAMES.split(", ").collect::<Vec<_>>();
        assert_eq!(cols, ["id", "name", "email", "password", "dish_ids"]);
    }

    #[test]
    fn update_touches_only_given_fields() {
        let sql = User::update_sql();
        for col in ["name", "email", "password"] {
            assert!(
                sql.contains(&format!("{col} = coalesce(")),
                "column '{col}' is not coalesced in:\n{sql}",
            );
        }
        assert!(!sql.contains("dish_ids = "), "update must not touch the dish list");
        assert!(sql.contains("where id = $1"));
        assert!(sql.contains("returning"));
    }

    #[test]
    fn remove_checks_user_before_cascade() {
        // A failed delete of a nonexistent user must not delete any dishes
        // (dangling owners are a supported state), so the user row has to be
        // deleted, and checked via `returning`, before the cascade runs.
        let [delete_user, delete_dishes] = User::remove_statements();
        assert!(delete_user.starts_with("delete from users where id = $1"));
        assert!(delete_user.contains("returning"));
        assert_eq!(delete_dishes, "delete from dishes where user_id = $1");
    }
}
