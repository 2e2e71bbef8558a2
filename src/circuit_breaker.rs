use failsafe::{backoff, failure_policy, Config};
use std::time::Duration;

/// Concrete breaker type held by the geocoding client.
pub type GeocoderCircuitBreaker = failsafe::StateMachine<
    failure_policy::ConsecutiveFailures<backoff::Exponential>,
    (),
>;

/// Creates a circuit breaker for the upstream geocoding API.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// While OPEN, lookups are rejected immediately and the resolver goes
/// straight to its offline fallbacks.
pub fn create_geocoder_circuit_breaker() -> GeocoderCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
