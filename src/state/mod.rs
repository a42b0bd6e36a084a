//! User-scoped application state
//!
//! Two single-writer stores: [`UserStore`] for the user and [`GroceryStore`]
//! for the shopping list. Both persist through the key-value adapter.

pub mod consistency;
pub mod grocery;
pub mod persist;
pub mod types;
pub mod user;

pub use grocery::{GroceryAction, GroceryStore};
pub use types::*;
pub use user::{HealthDataSource, HealthReading, UserAction, UserState, UserStore};
