//! # breakers-core
//!
//! In-memory circuit breaker for guarding calls to unreliable dependencies.
//!
//! A [`Breaker`] counts call attempts and failures over a rolling window of
//! whole seconds. When a failure pushes the window past the configured
//! threshold the breaker trips: for `reenable_after` seconds every call is
//! rejected without being attempted. After that the breaker is half-open and
//! the next outcome decides whether it closes again or re-trips.
//!
//! ## Key Guarantees
//!
//! 1. **Fail fast**: an open breaker never runs the operation
//! 2. **Transparent**: the operation's own error always reaches the caller
//! 3. **Distinguishable**: rejections and downstream failures are separate
//!    variants of [`BreakerError`]
//! 4. **Thread-safe**: one breaker can be shared through `Arc` across threads
//!
//! ## Example
//!
//! ```rust
//! use breakers_core::{Breaker, BreakerError, Strategy};
//!
//! let breaker = Breaker::builder(10.0)
//!     .service("payments")
//!     .strategy(Strategy::Percentage)
//!     .build()?;
//!
//! match breaker.execute(|| Err::<(), _>("connection refused")) {
//!     Ok(()) => println!("ok"),
//!     Err(BreakerError::Open { service }) => println!("{} unavailable", service),
//!     Err(BreakerError::Inner(e)) => println!("downstream failed: {}", e),
//! }
//! # Ok::<(), breakers_core::ConfigError>(())
//! ```

pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod strategy;
pub mod window;

// Re-export main types at crate root
pub use breaker::{Breaker, BreakerBuilder, BreakerSnapshot, BreakerState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreakerConfig, ConfigError};
pub use error::BreakerError;
pub use strategy::{Strategy, MINIMUM_CALLS};
pub use window::RollingWindow;
