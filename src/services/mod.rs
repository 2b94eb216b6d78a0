pub mod builder;
pub mod library;
pub mod pagination;
pub mod print;
pub mod reader;
pub mod seed;
pub mod validation;
