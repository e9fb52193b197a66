use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::melon::{Melon, MelonId};
use crate::session::SessionState;
use crate::shop::catalog::Catalog;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("cannot add melon {0}: it is not in the catalog")]
    InvalidItem(MelonId),
    #[error("cart references melon {0}, which is no longer in the catalog")]
    StaleEntry(MelonId),
}

/// Ordered melon ids, one per add-to-cart action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cart {
    entries: Vec<MelonId>,
}

impl Cart {
    pub fn entries(&self) -> &[MelonId] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub melon_id: MelonId,
    pub melon_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub lines: BTreeMap<MelonId, CartLine>,
    pub order_total: Decimal,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, id: MelonId) -> Option<&CartLine> {
        self.lines.get(&id)
    }

    /// Lines in ascending melon id order.
    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    pub fn item_count(&self) -> u32 {
        self.lines.values().map(|line| line.quantity).sum()
    }
}

/// Appends `id` to the session's cart, creating the cart on first use.
///
/// The id is checked against the catalog before anything is appended.
pub fn add<'c>(
    session: &mut SessionState,
    catalog: &'c Catalog,
    id: MelonId,
) -> Result<&'c Melon, CartError> {
    let melon = catalog.get_by_id(id).map_err(|_| CartError::InvalidItem(id))?;
    session.cart_mut().entries.push(id);
    Ok(melon)
}

/// Groups the session's cart by distinct melon id. A session without a cart,
/// or with an empty one, summarizes to an empty summary with a zero total.
pub fn summarize(session: &SessionState, catalog: &Catalog) -> Result<CartSummary, CartError> {
    let Some(cart) = session.cart().filter(|cart| !cart.is_empty()) else {
        return Ok(CartSummary::default());
    };

    let mut quantities: BTreeMap<MelonId, u32> = BTreeMap::new();
    for id in cart.entries() {
        *quantities.entry(*id).or_insert(0) += 1;
    }

    let mut summary = CartSummary::default();
    for (id, quantity) in quantities {
        let melon = catalog.get_by_id(id).map_err(|_| CartError::StaleEntry(id))?;
        let line_total = melon.price * Decimal::from(quantity);
        summary.order_total += line_total;
        summary.lines.insert(
            id,
            CartLine {
                melon_id: id,
                melon_name: melon.common_name.clone(),
                unit_price: melon.price,
                quantity,
                line_total,
            },
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{add, summarize, CartError, CartSummary};
    use crate::domain::melon::{Melon, MelonId};
    use crate::session::SessionState;
    use crate::shop::catalog::Catalog;

    fn melon(id: u32, name: &str, price: Decimal) -> Melon {
        Melon {
            id: MelonId(id),
            melon_type: name.to_ascii_lowercase(),
            common_name: name.to_string(),
            scientific_name: format!("Cucumis melo '{name}'"),
            price,
            image_url: String::new(),
            color: "green".to_string(),
            seedless: false,
            inventory_count: 0,
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            melon(1, "Crenshaw", Decimal::new(500, 2)),
            melon(2, "Casaba", Decimal::new(350, 2)),
        ])
        .expect("catalog")
    }

    #[test]
    fn summarizing_without_a_cart_yields_empty_summary() {
        let summary = summarize(&SessionState::default(), &catalog()).expect("summary");

        assert!(summary.is_empty());
        assert_eq!(summary.order_total, Decimal::ZERO);
        assert_eq!(summary.item_count(), 0);
    }

    #[test]
    fn created_but_empty_cart_summarizes_like_no_cart() {
        let mut session = SessionState::default();
        session.cart_mut();

        let summary = summarize(&session, &catalog()).expect("summary");

        assert!(session.cart().is_some_and(|cart| cart.is_empty()));
        assert_eq!(summary, CartSummary::default());
    }

    #[test]
    fn repeated_adds_accumulate_quantity() {
        let catalog = catalog();
        let mut session = SessionState::default();
        for _ in 0..3 {
            add(&mut session, &catalog, MelonId(2)).expect("add");
        }

        let summary = summarize(&session, &catalog).expect("summary");
        let line = summary.get(MelonId(2)).expect("line for melon 2");

        assert_eq!(summary.lines.len(), 1);
        assert_eq!(line.quantity, 3);
        assert_eq!(line.line_total, Decimal::new(1050, 2));
        assert_eq!(summary.order_total, Decimal::new(1050, 2));
    }

    #[test]
    fn distinct_items_each_get_one_line() {
        let catalog = catalog();
        let mut session = SessionState::default();
        add(&mut session, &catalog, MelonId(1)).expect("add 1");
        add(&mut session, &catalog, MelonId(2)).expect("add 2");

        let summary = summarize(&session, &catalog).expect("summary");

        assert_eq!(summary.lines.len(), 2);
        assert!(summary.lines().all(|line| line.quantity == 1));
        assert_eq!(summary.order_total, Decimal::new(850, 2));
    }

    #[test]
    fn mixed_cart_matches_worked_example() {
        let catalog = catalog();
        let mut session = SessionState::default();
        add(&mut session, &catalog, MelonId(1)).expect("add");
        add(&mut session, &catalog, MelonId(1)).expect("add");
        add(&mut session, &catalog, MelonId(2)).expect("add");

        let summary = summarize(&session, &catalog).expect("summary");
        let first = summary.get(MelonId(1)).expect("melon 1");
        let second = summary.get(MelonId(2)).expect("melon 2");

        assert_eq!((first.quantity, first.line_total), (2, Decimal::new(1000, 2)));
        assert_eq!((second.quantity, second.line_total), (1, Decimal::new(350, 2)));
        assert_eq!(summary.order_total, Decimal::new(1350, 2));
        assert_eq!(summary.item_count(), 3);
    }

    #[test]
    fn summarize_is_idempotent_and_does_not_mutate_entries() {
        let catalog = catalog();
        let mut session = SessionState::default();
        add(&mut session, &catalog, MelonId(2)).expect("add");
        add(&mut session, &catalog, MelonId(1)).expect("add");
        let before = session.clone();

        let first = summarize(&session, &catalog).expect("first");
        let second = summarize(&session, &catalog).expect("second");

        assert_eq!(first, second);
        assert_eq!(session, before);
        assert_eq!(
            session.cart().map(|cart| cart.entries().to_vec()),
            Some(vec![MelonId(2), MelonId(1)])
        );
    }

    #[test]
    fn adding_unknown_melon_is_rejected_and_leaves_cart_untouched() {
        let catalog = catalog();
        let mut session = SessionState::default();

        let result = add(&mut session, &catalog, MelonId(77));

        assert_eq!(result, Err(CartError::InvalidItem(MelonId(77))));
        assert!(session.cart().is_none(), "a rejected add must not create the cart");

        add(&mut session, &catalog, MelonId(1)).expect("add");
        assert!(add(&mut session, &catalog, MelonId(77)).is_err());
        assert_eq!(session.cart_len(), 1);
    }

    #[test]
    fn add_returns_the_melon_for_confirmation() {
        let catalog = catalog();
        let mut session = SessionState::default();

        let melon = add(&mut session, &catalog, MelonId(1)).expect("add");

        assert_eq!(melon.common_name, "Crenshaw");
    }

    #[test]
    fn summarizing_against_a_smaller_catalog_reports_stale_entry() {
        let mut session = SessionState::default();
        add(&mut session, &catalog(), MelonId(2)).expect("add");
        let smaller =
            Catalog::new(vec![melon(1, "Crenshaw", Decimal::new(500, 2))]).expect("catalog");

        assert_eq!(summarize(&session, &smaller), Err(CartError::StaleEntry(MelonId(2))));
    }
}
