use futures::TryStreamExt;
use juniper::graphql_object;
use tokio_postgres::Row;

use crate::{
    api::{Context, Id, err::{ApiResult, not_found}},
    db::{types::Key, util::dbargs},
};


/// A dish (recipe) owned by a user.
///
/// The owning user's key is stored in the `user_id` column, but it is not a
/// field of this API type: the ownership link is only visible through the
/// user's `dishId` list.
pub(crate) struct Dish {
    key: Key,
    name: String,
    image: String,
    ingredients: String,
    instructions: String,
    time: String,
    category: String,
    kind: String,
}

/// Data for creating a new dish.
pub(crate) struct NewDish {
    pub(crate) name: String,
    pub(crate) image: String,
    pub(crate) ingredients: String,
    pub(crate) instructions: String,
    pub(crate) time: String,
    pub(crate) category: String,
    pub(crate) kind: String,
    pub(crate) owner: Key,
}

/// Partial update of a dish. `None` fields are left untouched.
#[derive(Default)]
pub(crate) struct DishChanges {
    pub(crate) name: Option<String>,
    pub(crate) image: Option<String>,
    pub(crate) ingredients: Option<String>,
    pub(crate) instructions: Option<String>,
    pub(crate) time: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) kind: Option<String>,
}

#[graphql_object(Context = Context)]
impl Dish {
    fn id(&self) -> Id {
        Id::dish(self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dish_image(&self) -> &str {
        &self.image
    }

    /// Free-form text, not a structured list.
    fn ingredients(&self) -> &str {
        &self.ingredients
    }

    fn instructions(&self) -> &str {
        &self.instructions
    }

    fn time(&self) -> &str {
        &self.time
    }

    fn category(&self) -> &str {
        &self.category
    }

    #[graphql(name = "type")]
    fn kind(&self) -> &str {
        &self.kind
    }
}

impl Dish {
    pub(crate) async fn load_all(context: &Context) -> ApiResult<Vec<Self>> {
        let dishes = context.db
            .query_raw(
                &format!("select {} from dishes", Self::COL_NAMES),
                dbargs![],
            )
            .await?
            .map_ok(Self::from_row)
            .try_collect()
            .await?;

        Ok(dishes)
    }

    pub(crate) async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        if let Some(key) = id.key_for(Id::DISH_KIND) {
            Self::load_by_key(key, context).await
        } else {
            Ok(None)
        }
    }

    pub(crate) async fn load_by_key(key: Key, context: &Context) -> ApiResult<Option<Self>> {
        let result = context.db
            .query_opt(
                &format!("select {} from dishes where id = $1", Self::COL_NAMES),
                &[&key],
            )
            .await?
            .map(Self::from_row);

        Ok(result)
    }

    /// Creates a new dish and appends its key to the owning user's `dish_ids`
    /// list. The owner is not required to exist; if it doesn't, the append
    /// simply touches no row. Both statements run in the request's
    /// transaction.
    pub(crate) async fn create(dish: NewDish, context: &Context) -> ApiResult<Self> {
        let row = context.db
            .query_one(
                &format!(
                    "insert into dishes \
                        (name, image, ingredients, instructions, time, category, kind, user_id) \
                        values ($1, $2, $3, $4, $5, $6, $7, $8) \
                        returning {}",
                    Self::COL_NAMES,
                ),
                &[
                    &dish.name,
                    &dish.image,
                    &dish.ingredients,
                    &dish.instructions,
                    &dish.time,
                    &dish.category,
                    &dish.kind,
                    &dish.owner,
                ],
            )
            .await?;
        let created = Self::from_row(row);

        context.db
            .execute(Self::APPEND_TO_OWNER_SQL, &[&created.key, &dish.owner])
            .await?;

        Ok(created)
    }

    /// Applies the given partial update and returns the new state of the
    /// record.
    pub(crate) async fn update(id: Id, changes: DishChanges, context: &Context) -> ApiResult<Self> {
        let key = id.key_for(Id::DISH_KIND)
            .ok_or_else(|| not_found!("dish '{id}' does not exist"))?;

        let row = context.db
            .query_opt(
                &Self::update_sql(),
                &[
                    &key,
                    &changes.name,
                    &changes.image,
                    &changes.ingredients,
                    &changes.instructions,
                    &changes.time,
                    &changes.category,
                    &changes.kind,
                ],
            )
            .await?
            .ok_or_else(|| not_found!("dish '{id}' does not exist"))?;

        Ok(Self::from_row(row))
    }

    /// Deletes the dish and removes its key from the `dish_ids` list of every
    /// user listing it. Both statements run in the request's transaction, so
    /// the reverse link can never become stale. Returns the deleted record.
    pub(crate) async fn remove(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.key_for(Id::DISH_KIND)
            .ok_or_else(|| not_found!("dish '{id}' does not exist"))?;

        let row = context.db
            .query_opt(
                &format!("delete from dishes where id = $1 returning {}", Self::COL_NAMES),
                &[&key],
            )
            .await?
            .ok_or_else(|| not_found!("dish '{id}' does not exist"))?;

        context.db
            .execute(Self::UNLINK_FROM_OWNERS_SQL, &[&key])
            .await?;

        Ok(Self::from_row(row))
    }

    const COL_NAMES: &'static str =
        "id, name, image, ingredients, instructions, time, category, kind";

    /// Appends a freshly created dish's key to its owner's `dish_ids` list.
    /// Touches no row if the owner does not exist.
    const APPEND_TO_OWNER_SQL: &'static str =
        "update users set dish_ids = dish_ids || $1 where id = $2";

    /// Removes a deleted dish's key from every `dish_ids` list containing it.
    const UNLINK_FROM_OWNERS_SQL: &'static str =
        "update users set dish_ids = array_remove(dish_ids, $1) \
            where $1 = any(dish_ids)";

    /// The partial-update statement. `coalesce` keeps the previous value for
    /// every argument passed as null.
    fn update_sql() -> String {
        format!(
            "update dishes set \
                name = coalesce($2, name), \
                image = coalesce($3, image), \
                ingredients = coalesce($4, ingredients), \
                instructions = coalesce($5, instructions), \
                time = coalesce($6, time), \
                category = coalesce($7, category), \
                kind = coalesce($8, kind) \
                where id = $1 \
                returning {}",
            Self::COL_NAMES,
        )
    }

    fn from_row(row: Row) -> Self {
        Self {
            key: row.get(0),
            name: row.get(1),
            image: row.get(2),
            ingredients: row.get(3),
            instructions: row.get(4),
            time: row.get(5),
            category: row.get(6),
            kind: row.get(7),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::Dish;

    #[test]
    fn col_names_match_row_mapping() {
        // `from_row` reads columns by position, so this order is load
        // bearing for every statement that selects or returns `COL_NAMES`.
        let cols = Dish::COL_NAMES.split(", ").collect::<Vec<_>>();
        assert_eq!(
            cols,
            ["id", "name", "image", "ingredients", "instructions", "time", "category", "kind"],
        );
    }

    #[test]
    fn update_touches_only_given_fields() {
        let sql = Dish::update_sql();
        for col in ["name", "image", "ingredients", "instructions", "time", "category", "kind"] {
            assert!(
                sql.contains(&format!("{col} = coalesce(")),
                "column '{col}' is not coalesced in:\n{sql}",
            );
        }
        assert!(!sql.contains("user_id = "), "update must not change the owner");
        assert!(sql.contains("where id = $1"));
        assert!(sql.contains("returning"));
    }

    #[test]
    fn reverse_link_statements() {
        // Create appends to the owner's list, delete unlinks from all lists.
        assert!(Dish::APPEND_TO_OWNER_SQL.contains("dish_ids = dish_ids || $1"));
        assert!(Dish::APPEND_TO_OWNER_SQL.contains("where id = $2"));
        assert!(Dish::UNLINK_FROM_OWNERS_SQL.contains("array_remove(dish_ids, $1)"));
        assert!(Dish::UNLINK_FROM_OWNERS_SQL.contains("any(dish_ids)"));
    }
}
