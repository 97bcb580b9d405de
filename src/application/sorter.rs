//! Ordering of selector output.

use serde_json::Value;

use crate::domain::entity::{Entity, Params, lookup};
use crate::domain::types::OrderDirection;

pub const ORDER_BY_PARAM: &str = "orderBy";
pub const ORDER_DIRECTION_PARAM: &str = "orderDirection";

/// Sorts entities by one field.
///
/// The ascending order is a stable sort on the lower-cased string value at
/// `order_by`; anything that is not a string sorts as `""`. Descending order
/// is the ascending result reversed, so tied entities come out in the reverse
/// of their ascending order rather than in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sorter {
    order_by: Option<String>,
    direction: OrderDirection,
}

impl Sorter {
    pub fn new(order_by: Option<&str>, direction: OrderDirection) -> Self {
        Self {
            order_by: order_by.map(str::to_string),
            direction,
        }
    }

    /// Reads `orderBy` and `orderDirection` from request params.
    pub fn from_params(params: &Params) -> Self {
        let order_by = params.get(ORDER_BY_PARAM).and_then(Value::as_str);
        let direction = params
            .get(ORDER_DIRECTION_PARAM)
            .and_then(Value::as_str)
            .map(OrderDirection::parse)
            .unwrap_or_default();
        Self::new(order_by, direction)
    }

    pub fn sort(&self, mut items: Vec<Entity>) -> Vec<Entity> {
        if let Some(path) = &self.order_by {
            items.sort_by_cached_key(|item| sort_key(item, path));
        }
        if self.direction == OrderDirection::Desc {
            items.reverse();
        }
        items
    }
}

fn sort_key(item: &Entity, path: &str) -> String {
    match lookup(item, path) {
        Some(Value::String(text)) => text.to_lowercase(),
        _ => String::new(),
    }
}
