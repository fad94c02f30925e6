// Library interface for the journal binary and tests

// Declare all modules
pub mod capture;
pub mod config;
pub mod constants;
pub mod db;
pub mod device;
pub mod elapsed;
pub mod journal;
pub mod memory;
pub mod schema;
pub mod store;
pub mod testing;

pub mod queries {
    pub mod ddl;
    pub mod memories;
    pub mod metadata;
}

// Re-export the expected database version for convenience
pub use constants::EXPECTED_DB_VERSION;
