pub mod catalog;
pub mod core;
pub mod people;
pub mod reports;
