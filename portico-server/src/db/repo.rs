
pub mod account;
pub mod account_db;
pub mod account_mem;
