//! REST resources under `/api`.

pub mod carts;
pub mod categories;
pub mod orders;
pub mod positions;
pub mod users;
