pub mod config;
pub mod domain;
pub mod errors;
pub mod session;
pub mod shop;

pub use domain::melon::{Melon, MelonId};
pub use errors::{InterfaceError, ShopError};
pub use session::{FlashLevel, FlashMessage, SessionState};
pub use shop::cart::{Cart, CartError, CartLine, CartSummary};
pub use shop::catalog::{Catalog, CatalogError};
