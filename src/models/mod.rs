/// Data-access layer
///
/// Plain sqlx queries over the users and todos tables. Every todo query is
/// scoped to the authenticated principal's id.

pub mod todos;
pub mod users;
