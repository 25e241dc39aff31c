use juniper::graphql_object;

use super::{
    Context,
    Id,
    err::ApiResult,
    model::{dish::Dish, user::User},
};


/// The root query object.
pub(crate) struct Query;

#[graphql_object(Context = Context)]
impl Query {
    /// Returns all dishes, in store-native order.
    async fn dishes(context: &Context) -> ApiResult<Vec<Dish>> {
        Dish::load_all(context).await
    }

    /// Returns the dish with the given ID, or `null` if the ID does not
    /// refer to a dish.
    async fn dish(id: Id, context: &Context) -> ApiResult<Option<Dish>> {
        Dish::load_by_id(id, context).await
    }

    /// Returns all users.
    async fn users(context: &Context) -> ApiResult<Vec<User>> {
        User::load_all(context).await
    }

    /// Returns the user with the given ID, or `null` if the ID does not
    /// refer to a user.
    async fn user(id: Id, context: &Context) -> ApiResult<Option<User>> {
        User::load_by_id(id, context).await
    }
}
