mod bson;
mod collection;

pub use self::bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
