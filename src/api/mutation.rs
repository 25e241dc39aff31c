use juniper::graphql_object;

use super::{
    Context,
    Id,
    err::{ApiResult, invalid_input},
    model::{
        dish::{Dish, DishChanges, NewDish},
        user::{NewUser, User, UserChanges},
    },
};


/// The root mutation object.
pub(crate) struct Mutation;

#[graphql_object(Context = Context)]
impl Mutation {
    /// Creates a new dish owned by the given user. Also appends the new
    /// dish's ID to that user's `dishId` list. The owner is not required to
    /// exist.
    async fn add_dish(
        name: String,
        dish_image: String,
        ingredients: String,
        instructions: String,
        time: String,
        category: String,
        #[graphql(name = "type")] kind: String,
        user_id: Id,
        context: &Context,
    ) -> ApiResult<Dish> {
        let owner = user_id.key_for(Id::USER_KIND)
            .ok_or_else(|| invalid_input!("`userId` is not a user ID: '{user_id}'"))?;

        Dish::create(NewDish {
            name,
            image: dish_image,
            ingredients,
            instructions,
            time,
            category,
            kind,
            owner,
        }, context).await
    }

    /// Overwrites the given fields of a dish; omitted fields keep their
    /// previous values. Returns the updated record.
    async fn update_dish(
        id: Id,
        name: Option<String>,
        dish_image: Option<String>,
        ingredients: Option<String>,
        instructions: Option<String>,
        time: Option<String>,
        category: Option<String>,
        #[graphql(name = "type")] kind: Option<String>,
        context: &Context,
    ) -> ApiResult<Dish> {
        Dish::update(id, DishChanges {
            name,
            image: dish_image,
            ingredients,
            instructions,
            time,
            category,
            kind,
        }, context).await
    }

    /// Deletes a dish and removes its ID from the owning user's `dishId`
    /// list. Returns the deleted record.
    async fn delete_dish(id: Id, context: &Context) -> ApiResult<Dish> {
        Dish::remove(id, context).await
    }

    /// Creates a new user. `dishId` defaults to the empty list.
    async fn add_user(
        name: String,
        email: String,
        password: String,
        dish_id: Option<Vec<Id>>,
        context: &Context,
    ) -> ApiResult<User> {
        let dish_ids = dish_id
            .unwrap_or_default()
            .into_iter()
            .map(|id| {
                id.key_for(Id::DISH_KIND)
                    .ok_or_else(|| invalid_input!("`dishId` contains a non-dish ID: '{id}'"))
            })
            .collect::<Result<_, _>>()?;

        User::create(NewUser { name, email, password, dish_ids }, context).await
    }

    /// Overwrites the given fields of a user; omitted fields keep their
    /// previous values. Returns the updated record.
    async fn update_user(
        id: Id,
        name: Option<String>,
        email: Option<String>,
        password: Option<String>,
        context: &Context,
    ) -> ApiResult<User> {
        User::update(id, UserChanges { name, email, password }, context).await
    }

    /// Deletes a user together with all dishes they own. Returns the deleted
    /// user.
    async fn delete_user(id: Id, context: &Context) -> ApiResult<User> {
        User::remove(id, context).await
    }
}
