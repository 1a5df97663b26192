pub mod account;
pub mod forms;
pub mod types;
