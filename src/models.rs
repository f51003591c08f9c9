use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// User identifier attached to carts and wishlists before authentication.
pub const GUEST_USER_ID: &str = "guest";

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One selectable value inside a product option, with the price change it
/// causes when chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OptionChoice {
    pub label: String,
    #[serde(default)]
    pub price_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OptionField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    pub choices: Vec<OptionChoice>,
}

/// Configurable options a product carries, keyed by product kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptionSchema {
    #[default]
    Standard,
    Apparel {
        sizes: Vec<OptionChoice>,
        colors: Vec<OptionChoice>,
    },
    Personalized {
        fields: Vec<OptionField>,
    },
}

impl OptionSchema {
    pub fn fields(&self) -> Vec<OptionField> {
        match self {
            OptionSchema::Standard => Vec::new(),
            OptionSchema::Apparel { sizes, colors } => vec![
                OptionField {
                    name: "size".to_string(),
                    required: true,
                    choices: sizes.clone(),
                },
                OptionField {
                    name: "color".to_string(),
                    required: true,
                    choices: colors.clone(),
                },
            ],
            OptionSchema::Personalized { fields } => fields.clone(),
        }
    }

    /// Check a buyer's selection against the schema and resolve the price
    /// delta of every chosen value. Unknown options, unknown values, and
    /// missing required options are rejected.
    pub fn resolve_selection(
        &self,
        selected: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, i64>, String> {
        let fields = self.fields();

        for (name, value) in selected {
            let Some(field) = fields.iter().find(|f| &f.name == name) else {
                return Err(format!("unknown option \"{name}\""));
            };
            if !field.choices.iter().any(|c| &c.label == value) {
                return Err(format!("invalid value \"{value}\" for option \"{name}\""));
            }
        }

        for field in &fields {
            if field.required && !selected.contains_key(&field.name) {
                return Err(format!("option \"{}\" is required", field.name));
            }
        }

        let mut deltas = BTreeMap::new();
        for (name, value) in selected {
            let delta = fields
                .iter()
                .find(|f| &f.name == name)
                .and_then(|f| f.choices.iter().find(|c| &c.label == value))
                .map(|c| c.price_delta)
                .unwrap_or(0);
            deltas.insert(name.clone(), delta);
        }
        Ok(deltas)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub image: Option<String>,
    #[schema(value_type = OptionSchema)]
    pub options: Json<OptionSchema>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: String,
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: i64,
    pub image: Option<String>,
    #[schema(value_type = BTreeMap<String, String>)]
    pub selected_options: Json<BTreeMap<String, String>>,
    #[schema(value_type = BTreeMap<String, i64>)]
    pub option_deltas: Json<BTreeMap<String, i64>>,
    #[schema(value_type = Vec<String>)]
    pub attachments: Json<Vec<String>>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> i64 {
        crate::pricing::line_total(self.unit_price, self.option_deltas.values(), self.quantity)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: String,
    pub product_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_type: String,
    pub discount_value: i64,
    pub min_order_amount: i64,
    pub max_usage: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Allowed lifecycle: pending -> processing -> shipped -> delivered,
    /// plus pending -> cancelled. Delivered and cancelled are terminal.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub shipping_address: String,
    pub payment_method: String,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub coupon_code: Option<String>,
    pub coupon_discount: i64,
    pub total: i64,
    pub status: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    #[schema(value_type = BTreeMap<String, String>)]
    pub selected_options: Json<BTreeMap<String, String>>,
    #[schema(value_type = BTreeMap<String, i64>)]
    pub option_deltas: Json<BTreeMap<String, i64>>,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub product_id: i64,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

const IMAGE_MIME_TYPES: [&str; 5] = ["jpeg", "png", "gif", "webp", "avif"];

/// Images travel as base64 data URLs; accept only the image MIME types the
/// storefront serves.
pub fn is_image_data_url(value: &str) -> bool {
    IMAGE_MIME_TYPES.iter().any(|mime| {
        value
            .strip_prefix(&format!("data:image/{mime};base64,"))
            .is_some_and(|rest| !rest.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apparel() -> OptionSchema {
        OptionSchema::Apparel {
            sizes: vec![
                OptionChoice {
                    label: "M".into(),
                    price_delta: 0,
                },
                OptionChoice {
                    label: "XL".into(),
                    price_delta: 200,
                },
            ],
            colors: vec![OptionChoice {
                label: "navy".into(),
                price_delta: 0,
            }],
        }
    }

    #[test]
    fn resolves_apparel_selection_with_deltas() {
        let selected = BTreeMap::from([
            ("size".to_string(), "XL".to_string()),
            ("color".to_string(), "navy".to_string()),
        ]);
        let deltas = apparel().resolve_selection(&selected).unwrap();
        assert_eq!(deltas.get("size"), Some(&200));
        assert_eq!(deltas.get("color"), Some(&0));
    }

    #[test]
    fn rejects_unknown_option_and_value() {
        let unknown = BTreeMap::from([("engraving".to_string(), "hi".to_string())]);
        assert!(apparel().resolve_selection(&unknown).is_err());

        let bad_value = BTreeMap::from([
            ("size".to_string(), "XXS".to_string()),
            ("color".to_string(), "navy".to_string()),
        ]);
        assert!(apparel().resolve_selection(&bad_value).is_err());
    }

    #[test]
    fn rejects_missing_required_option() {
        let missing = BTreeMap::from([("size".to_string(), "M".to_string())]);
        let err = apparel().resolve_selection(&missing).unwrap_err();
        assert!(err.contains("color"));
    }

    #[test]
    fn standard_products_accept_only_empty_selection() {
        let schema = OptionSchema::Standard;
        assert!(schema.resolve_selection(&BTreeMap::new()).unwrap().is_empty());
        let selected = BTreeMap::from([("size".to_string(), "M".to_string())]);
        assert!(schema.resolve_selection(&selected).is_err());
    }

    #[test]
    fn status_transitions_follow_the_lifecycle() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Processing.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Delivered));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("paid"), None);
    }

    #[test]
    fn accepts_only_image_data_urls() {
        assert!(is_image_data_url("data:image/png;base64,iVBORw0KGgo="));
        assert!(is_image_data_url("data:image/webp;base64,UklGRg=="));
        assert!(!is_image_data_url("data:image/svg+xml;base64,PHN2Zz4="));
        assert!(!is_image_data_url("data:image/png;base64,"));
        assert!(!is_image_data_url("data:text/plain;base64,aGk="));
        assert!(!is_image_data_url("https://example.com/a.png"));
    }
}
