pub mod init;
pub mod ledger;
pub mod models;
pub mod queries;
pub mod schema;
#[cfg(test)]
pub(crate) mod testing;

pub use init::DbPool;
pub use models::*;
