//! Helpers for setting up throwaway databases and signed gateway traffic in tests.
mod fixtures;
mod prepare_env;

pub use fixtures::{
    sample_plans,
    seed_plans,
    signed_notification,
    test_gateway,
    FixedRateProvider,
    TEST_GATEWAY_URL,
    TEST_HASH_IV,
    TEST_HASH_KEY,
    TEST_MERCHANT_ID,
};
pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
