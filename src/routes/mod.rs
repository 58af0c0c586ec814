mod auth;
mod health_check;
mod todo;

pub use auth::{login, refresh, register};
pub use health_check::health_check;
pub use todo::{create as todo_create, delete as todo_delete, index as todo_index,
    mark as todo_mark, show as todo_show, update as todo_update};
