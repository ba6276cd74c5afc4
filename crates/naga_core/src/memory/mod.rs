//! # Memory Management
//!
//! Fixed-size pools for objects, a recycling list for spare items, and a
//! bump arena for immutable strings.
//!
//! ## Design Philosophy
//!
//! Small objects of one type are allocated over and over during gameplay:
//! - Cells come from blocks, not from one heap call each
//! - Released cells are reused most-recently-freed first
//! - Blocks live as long as their pool; nothing is compacted

mod arena;
mod block_pool;
mod item_pool;
mod typed_pool;

pub use arena::{ByteArena, DEFAULT_BUFFER_SIZE};
pub use block_pool::{BlockPool, BLOCK_ALIGN};
pub use item_pool::ItemPool;
pub use typed_pool::{pool_registry, PoolKey, PoolRegistry, PoolStats, SharedPool, TypedPool};
