mod bson;
mod collection;
mod errors;
mod transaction;

pub use bson::{ids_from_bson, serde_string_map, unique_ids, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::{is_duplicate_key_error, DUPLICATE_KEY};
pub use transaction::retry_transient;
