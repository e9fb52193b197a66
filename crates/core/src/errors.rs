use thiserror::Error;

use crate::shop::{cart::CartError, catalog::CatalogError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ShopError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error("template rendering failed: {0}")]
    Render(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "We couldn't find the melon you were looking for.",
            Self::BadRequest { .. } => {
                "That melon isn't in our catalog, so nothing was added to your cart."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message, .. }
            | Self::BadRequest { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ShopError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ShopError> for InterfaceError {
    fn from(value: ShopError) -> Self {
        let message = value.to_string();
        match value {
            ShopError::Catalog(CatalogError::NotFound(_)) => {
                Self::NotFound { message, correlation_id: "unassigned".to_owned() }
            }
            ShopError::Cart(CartError::InvalidItem(_)) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ShopError::Catalog(_) | ShopError::Cart(CartError::StaleEntry(_)) | ShopError::Render(_) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::melon::MelonId;
    use crate::errors::{InterfaceError, ShopError};
    use crate::shop::{cart::CartError, catalog::CatalogError};

    #[test]
    fn unknown_melon_maps_to_not_found() {
        let interface =
            ShopError::from(CatalogError::NotFound(MelonId(42))).into_interface("session-1");

        assert!(matches!(
            interface,
            InterfaceError::NotFound { ref correlation_id, .. } if correlation_id == "session-1"
        ));
        assert!(interface.message().contains("42"));
    }

    #[test]
    fn invalid_cart_item_maps_to_bad_request_with_user_safe_message() {
        let interface =
            ShopError::from(CartError::InvalidItem(MelonId(99))).into_interface("session-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(
            interface.user_message(),
            "That melon isn't in our catalog, so nothing was added to your cart."
        );
        assert_eq!(interface.correlation_id(), "session-2");
    }

    #[test]
    fn stale_cart_entry_and_render_failures_map_to_internal() {
        let stale = ShopError::from(CartError::StaleEntry(MelonId(3))).into_interface("s");
        let render = ShopError::Render("missing template".to_owned()).into_interface("s");

        assert!(matches!(stale, InterfaceError::Internal { .. }));
        assert!(matches!(render, InterfaceError::Internal { .. }));
        assert_eq!(render.user_message(), "An unexpected internal error occurred.");
    }
}
