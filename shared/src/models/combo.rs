//! Product combo (bundle) models

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One constituent of a combo: a product and how many units one combo consumes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ComboComponent {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl ComboComponent {
    pub fn new(product_id: Uuid, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// How many whole combos can be assembled from the given on-hand quantities.
///
/// A missing product counts as zero stock. A combo without components has no
/// availability.
pub fn combo_availability(components: &[ComboComponent], on_hand: &HashMap<Uuid, i32>) -> i32 {
    components
        .iter()
        .filter(|c| c.quantity > 0)
        .map(|c| {
            let available = on_hand.get(&c.product_id).copied().unwrap_or(0).max(0);
            available / c.quantity
        })
        .min()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_is_limited_by_scarcest_component() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let components = vec![ComboComponent::new(a, 2), ComboComponent::new(b, 1)];
        let on_hand = HashMap::from([(a, 9), (b, 10)]);

        assert_eq!(combo_availability(&components, &on_hand), 4);
    }

    #[test]
    fn availability_missing_product() {
        let a = Uuid::new_v4();
        let components = vec![ComboComponent::new(a, 1)];
        assert_eq!(combo_availability(&components, &HashMap::new()), 0);
    }

    #[test]
    fn availability_empty_combo() {
        assert_eq!(combo_availability(&[], &HashMap::new()), 0);
    }
}
