pub mod context;
pub mod history;
