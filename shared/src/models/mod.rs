//! Domain models for the Food Back-Office Platform

mod combo;
mod customer;
mod finance;
mod order;
mod product;

pub use combo::*;
pub use customer::*;
pub use finance::*;
pub use order::*;
pub use product::*;
