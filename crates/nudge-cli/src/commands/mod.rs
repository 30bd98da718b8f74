pub mod add;
pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod delete;
pub mod done;
pub mod edit;
pub mod list;
pub mod mode;
pub mod sync;
