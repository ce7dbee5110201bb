mod schema;
mod settings;
mod types;
mod websites;
mod workspace;

pub use schema::Database;
pub use types::DatabaseError;
