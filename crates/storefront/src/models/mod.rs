//! Domain models for the storefront.
//!
//! These are validated domain objects. Database row types live next to the
//! queries that produce them in [`crate::db`].

pub mod order;
pub mod product;
pub mod user;

pub use order::{LineItem, NewOrder, Order, ProductRef, RequestedLine};
pub use product::{
    NewProduct, PriceRange, Product, ProductPatch, ProductSort, SortField, SortOrder,
    SortParseError,
};
pub use user::{Identity, User, UserRecord};
