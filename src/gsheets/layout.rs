use serde_json::{Number, Value};

use crate::storage::tariff;

pub const HEADERS: [&str; 11] = [
    "Warehouse Name",
    "Geo Name",
    "Delivery Base",
    "Delivery Coef",
    "Delivery Liter",
    "Marketplace Delivery Base",
    "Marketplace Delivery Coef",
    "Marketplace Delivery Liter",
    "Storage Base",
    "Storage Coef",
    "Storage Liter",
];

/// Содержимое листа: отметка времени, заголовки, затем строки в переданном порядке
pub fn sheet_values(timestamp_label: &str, rows: &[tariff::Model]) -> Vec<Vec<Value>> {
    let mut values = Vec::with_capacity(rows.len() + 2);
    values.push(vec![Value::String(timestamp_label.to_string())]);
    values.push(HEADERS.iter().map(|h| Value::String(h.to_string())).collect());
    values.extend(rows.iter().map(row_values));
    values
}

fn row_values(row: &tariff::Model) -> Vec<Value> {
    vec![
        Value::String(row.warehouse_name.clone()),
        Value::String(row.geo_name.clone().unwrap_or_default()),
        decimal(row.box_delivery_base),
        integer(row.box_delivery_coef_expr),
        decimal(row.box_delivery_liter),
        decimal(row.box_delivery_marketplace_base),
        integer(row.box_delivery_marketplace_coef_expr),
        decimal(row.box_delivery_marketplace_liter),
        decimal(row.box_storage_base),
        integer(row.box_storage_coef_expr),
        decimal(row.box_storage_liter),
    ]
}

// пустая ячейка вместо NULL
fn empty() -> Value {
    Value::String(String::new())
}

fn decimal(v: Option<f64>) -> Value {
    v.and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(empty)
}

fn integer(v: Option<i32>) -> Value {
    v.map(|n| Value::Number(n.into())).unwrap_or_else(empty)
}
