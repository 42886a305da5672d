// Postgres access: one bb8 pool of async diesel connections
pub mod diesel_pool;

pub use diesel_pool::{
    check_diesel_health, create_diesel_pool, mask_connection_string, DieselDatabaseConfig,
    DieselPool, PoolError, MIGRATIONS,
};
