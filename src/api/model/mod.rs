pub(crate) mod dish;
pub(crate) mod user;
