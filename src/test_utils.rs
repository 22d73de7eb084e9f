//! Common test utilities

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::sessions::Address;

/// Deterministic RNG so test failures reproduce.
pub fn test_rng() -> StdRng {
    StdRng::seed_from_u64(0x5eed_5eed)
}

/// A recognizable roster address: `tag` repeated.
pub fn addr(tag: u8) -> Address {
    Address::new([tag; 32])
}

/// Install a fmt subscriber once; respects `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    use once_cell::sync::OnceCell;
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub mod serde {
    use serde::de::DeserializeOwned;
    use serde::Serialize;

    pub fn assert_round_trip_json<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let json = serde_json::to_string(value).expect("value should serialize");
        let back: T = serde_json::from_str(&json).expect("value should deserialize");
        assert_eq!(&back, value);
    }
}
