//! Types library for the TWAP settlement oracle
//!
//! Shared type definitions used by the oracle service and its tests,
//! keeping interval identity and fixed-point arithmetic in one place.
//!
//! # Modules
//! - `ids`: Grid interval identifiers (IntervalId, IntervalWidth)
//! - `numeric`: Fixed-point price type (FixedPrice)
//! - `tick`: Normalized price ticks (PriceTick)
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod tick;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::tick::*;
    pub use crate::errors::*;
}
