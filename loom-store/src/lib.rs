mod resolve;
mod store;
mod transaction;

pub use resolve::Resolve;
pub use store::Store;
pub use transaction::Transaction;
