//! Per-session state carried between requests: the cart and pending flashes.

use serde::Serialize;

use crate::shop::cart::Cart;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Info,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    cart: Option<Cart>,
    flashes: Vec<FlashMessage>,
}

impl SessionState {
    /// The session's cart, if anything has ever been added to it.
    pub fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        self.cart.get_or_insert_with(Cart::default)
    }

    pub fn cart_len(&self) -> usize {
        self.cart.as_ref().map_or(0, Cart::len)
    }

    pub fn flash(&mut self, level: FlashLevel, text: impl Into<String>) {
        self.flashes.push(FlashMessage { level, text: text.into() });
    }

    /// Drains queued flashes; each message is shown once.
    pub fn take_flashes(&mut self) -> Vec<FlashMessage> {
        std::mem::take(&mut self.flashes)
    }
}

#[cfg(test)]
mod tests {
    use super::{FlashLevel, SessionState};

    #[test]
    fn new_session_has_no_cart_and_no_flashes() {
        let mut session = SessionState::default();

        assert!(session.cart().is_none());
        assert_eq!(session.cart_len(), 0);
        assert!(session.take_flashes().is_empty());
    }

    #[test]
    fn flashes_are_consumed_once() {
        let mut session = SessionState::default();
        session.flash(FlashLevel::Info, "Crenshaw was added to cart");
        session.flash(FlashLevel::Warning, "Sorry!");

        let first = session.take_flashes();
        let second = session.take_flashes();

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].text, "Crenshaw was added to cart");
        assert_eq!(first[1].level, FlashLevel::Warning);
        assert!(second.is_empty());
    }
}
