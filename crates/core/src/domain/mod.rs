pub mod asset;
pub mod indices;
pub mod metric;
pub mod portfolio;
pub mod radar;
