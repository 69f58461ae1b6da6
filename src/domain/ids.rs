//! Type-safe identifiers for trips, checkpoint logs, and drivers.
//!
//! All three wrap the `BIGSERIAL` row id assigned by the store. Keeping them
//! as distinct newtypes means a [`LogId`] can never be passed where a
//! [`TripId`] is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw store identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw store identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id!(
    /// Unique identifier of a trip.
    TripId
);

numeric_id!(
    /// Unique identifier of a single checkpoint log entry.
    ///
    /// Log ids are assigned in append order, so they break ties between
    /// checkpoints recorded with the same timestamp.
    LogId
);

numeric_id!(
    /// Identifier of a driver, owned by the fleet directory.
    DriverId
);
