/// Schedule cell and season persistence.
pub mod cell_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
