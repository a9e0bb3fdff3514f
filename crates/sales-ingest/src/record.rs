//! Source row parsing and entity derivation
//!
//! A source row has exactly fifteen columns in a fixed order. The header line
//! is never interpreted; columns are taken by position.
//!
//! Numeric columns are lenient: anything that does not parse becomes zero.
//! The sale date is strict and must be `YYYY-MM-DD`.

use chrono::NaiveDate;

use crate::error::IngestError;
use crate::models::{Customer, Order, Product};

/// Number of columns in every data row
pub const FIELD_COUNT: usize = 15;

/// `chrono` format of `date_of_sale`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One data row, fields kept as raw text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub order_id: String,
    pub product_id: String,
    pub customer_id: String,
    pub product_name: String,
    pub category: String,
    pub region: String,
    pub date_of_sale: String,
    pub quantity_sold: String,
    pub unit_price: String,
    pub discount: String,
    pub shipping_cost: String,
    pub payment_method: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: String,
}

impl SourceRecord {
    /// Build a record from one row's fields.
    ///
    /// `row` is the 1-based data row number, used in the error when the row
    /// does not have exactly [`FIELD_COUNT`] fields.
    pub fn from_fields<'a, I>(row: u64, fields: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().collect();
        let [order_id, product_id, customer_id, product_name, category, region, date_of_sale, quantity_sold, unit_price, discount, shipping_cost, payment_method, customer_name, customer_email, customer_address] =
            fields.as_slice()
        else {
            return Err(IngestError::SourceFormat {
                row,
                reason: format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
            });
        };

        Ok(Self {
            order_id: order_id.to_string(),
            product_id: product_id.to_string(),
            customer_id: customer_id.to_string(),
            product_name: product_name.to_string(),
            category: category.to_string(),
            region: region.to_string(),
            date_of_sale: date_of_sale.to_string(),
            quantity_sold: quantity_sold.to_string(),
            unit_price: unit_price.to_string(),
            discount: discount.to_string(),
            shipping_cost: shipping_cost.to_string(),
            payment_method: payment_method.to_string(),
            customer_name: customer_name.to_string(),
            customer_email: customer_email.to_string(),
            customer_address: customer_address.to_string(),
        })
    }

    pub fn customer(&self) -> Customer {
        Customer {
            customer_id: self.customer_id.clone(),
            name: self.customer_name.clone(),
            email: self.customer_email.clone(),
            address: self.customer_address.clone(),
        }
    }

    pub fn product(&self) -> Product {
        Product {
            product_id: self.product_id.clone(),
            name: self.product_name.clone(),
            category: self.category.clone(),
            unit_price: parse_f64_or_zero(&self.unit_price),
            discount: parse_f64_or_zero(&self.discount),
        }
    }

    /// Derive the order. Fails only when `date_of_sale` is not a valid date.
    pub fn order(&self) -> Result<Order, IngestError> {
        let date_of_sale =
            parse_sale_date(&self.date_of_sale).map_err(|e| IngestError::FieldParse {
                field: "date_of_sale",
                value: self.date_of_sale.clone(),
                order_id: self.order_id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Order {
            order_id: self.order_id.clone(),
            product_id: self.product_id.clone(),
            customer_id: self.customer_id.clone(),
            region: self.region.clone(),
            date_of_sale,
            quantity_sold: parse_i64_or_zero(&self.quantity_sold),
            shipping_cost: parse_f64_or_zero(&self.shipping_cost),
            payment_method: self.payment_method.clone(),
        })
    }
}

pub fn parse_sale_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
}

fn parse_f64_or_zero(value: &str) -> f64 {
    value.parse().unwrap_or(0.0)
}

fn parse_i64_or_zero(value: &str) -> i64 {
    value.parse().unwrap_or(0)
}
