pub mod catalog;
pub mod index;
