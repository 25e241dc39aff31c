//! Definition of the GraphQL API.

use juniper::EmptySubscription;

use self::{
    mutation::Mutation,
    query::Query,
};

pub(crate) mod err;
pub(crate) mod model;

mod context;
mod id;
mod mutation;
mod query;

pub(crate) use self::{
    id::Id,
    context::Context,
};


/// Creates and returns the API root node.
pub(crate) fn root_node() -> RootNode {
    RootNode::new(Query, Mutation, EmptySubscription::new())
}

/// Type of our API root node.
pub(crate) type RootNode = juniper::RootNode<
    'static,
    Query,
    Mutation,
    EmptySubscription<Context>,
>;


#[cfg(test)]
mod tests {
    /// The full schema surface, as SDL. Everything the API offers has to show
    /// up here; accidental renames (e.g. `dishId` vs `dishIds`) or dropped
    /// operations make this fail.
    #[test]
    fn schema_surface() {
        let sdl = super::root_node().as_sdl();

        for ty in ["type User", "type Dish", "type Query", "type Mutation"] {
            assert!(sdl.contains(ty), "missing `{ty}` in schema:\n{sdl}");
        }

        // Query surface.
        for q in ["dishes", "dish(", "users", "user("] {
            assert!(sdl.contains(q), "missing query `{q}` in schema:\n{sdl}");
        }

        // Mutation surface.
        for m in [
            "addDish(", "updateDish(", "deleteDish(",
            "addUser(", "updateUser(", "deleteUser(",
        ] {
            assert!(sdl.contains(m), "missing mutation `{m}` in schema:\n{sdl}");
        }

        // Field names as the API contract spells them.
        for f in ["dishId", "dishImage", "ingredients", "instructions", "type: String!"] {
            assert!(sdl.contains(f), "missing field `{f}` in schema:\n{sdl}");
        }
    }
}
