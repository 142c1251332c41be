pub mod shard;
pub mod storage;

pub use shard::{ShardAssigner, ShardLabel};
