use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

use crate::{storage::NewTariff, wbseller::models::WarehouseTariff};

/// Значение WB «нет данных»
pub const NOT_AVAILABLE: &str = "-";

/// Что делать с числовым полем, которое не удалось разобрать
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedNumberPolicy {
    /// Обнулить поле и записать предупреждение
    #[default]
    Null,
    /// Отклонить всю загрузку за дату
    Fail,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("warehouse '{warehouse}': field {field} has unparseable value '{value}'")]
pub struct TransformError {
    pub warehouse: String,
    pub field: &'static str,
    pub value: String,
}

/// Результат нормализации ответа WB
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub rows: Vec<NewTariff>,
    /// Поля, обнулённые из-за нечитаемого значения
    pub nulled_fields: usize,
    /// Записи без названия склада, пропущенные при политике `Null`
    pub skipped_records: usize,
}

/// Значение поля после проверки на «нет данных»
pub fn present(raw: Option<&str>) -> Option<&str> {
    let value = raw?.trim();
    if value.is_empty() || value == NOT_AVAILABLE {
        None
    } else {
        Some(value)
    }
}

/// Дробное число с запятой в качестве разделителя: "12,5" -> 12.5.
/// Пробел допускается только между группами разрядов: "1 039,5"
pub fn parse_decimal(value: &str) -> Option<f64> {
    let value = value.trim();
    if !DECIMAL.is_match(value) {
        return None;
    }
    strip_group_separators(value)
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Коэффициент — только целое число
pub fn parse_coefficient(value: &str) -> Option<i32> {
    let value = value.trim();
    if !INTEGER.is_match(value) {
        return None;
    }
    strip_group_separators(value).parse::<i32>().ok()
}

static DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(?:[0-9]{1,3}(?:[ \x{a0}][0-9]{3})+|[0-9]+)(?:[,.][0-9]+)?$")
        .expect("decimal pattern is valid")
});

static INTEGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(?:[0-9]{1,3}(?:[ \x{a0}][0-9]{3})+|[0-9]+)$")
        .expect("integer pattern is valid")
});

fn strip_group_separators(value: &str) -> String {
    value.chars().filter(|c| *c != ' ' && *c != '\u{a0}').collect()
}

struct FieldReader<'a> {
    warehouse: &'a str,
    policy: MalformedNumberPolicy,
    nulled: usize,
}

impl FieldReader<'_> {
    fn decimal(
        &mut self,
        field: &'static str,
        raw: &Option<String>,
    ) -> Result<Option<f64>, TransformError> {
        match present(raw.as_deref()) {
            None => Ok(None),
            Some(value) => match parse_decimal(value) {
                Some(v) => Ok(Some(v)),
                None => self.reject(field, value).map(|_| None),
            },
        }
    }

    fn coefficient(
        &mut self,
        field: &'static str,
        raw: &Option<String>,
    ) -> Result<Option<i32>, TransformError> {
        match present(raw.as_deref()) {
            None => Ok(None),
            Some(value) => match parse_coefficient(value) {
                Some(v) => Ok(Some(v)),
                None => self.reject(field, value).map(|_| None),
            },
        }
    }

    fn reject(&mut self, field: &'static str, value: &str) -> Result<(), TransformError> {
        let err = TransformError {
            warehouse: self.warehouse.to_string(),
            field,
            value: value.to_string(),
        };
        match self.policy {
            MalformedNumberPolicy::Fail => Err(err),
            MalformedNumberPolicy::Null => {
                tracing::warn!("{err}, stored as NULL");
                self.nulled += 1;
                Ok(())
            }
        }
    }
}

/// Преобразование записей WB в строки для сохранения
pub fn normalize(
    records: &[WarehouseTariff],
    policy: MalformedNumberPolicy,
) -> Result<Normalized, TransformError> {
    let mut out = Normalized {
        rows: Vec::with_capacity(records.len()),
        ..Default::default()
    };

    for record in records {
        let warehouse = record.warehouse_name.trim();
        if warehouse.is_empty() {
            let err = TransformError {
                warehouse: String::new(),
                field: "warehouse_name",
                value: record.warehouse_name.clone(),
            };
            if policy == MalformedNumberPolicy::Fail {
                return Err(err);
            }
            tracing::warn!("{err}, record skipped");
            out.skipped_records += 1;
            continue;
        }

        let mut r = FieldReader {
            warehouse,
            policy,
            nulled: 0,
        };

        let row = NewTariff {
            warehouse_name: warehouse.to_string(),
            geo_name: record
                .geo_name
                .as_deref()
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(ToString::to_string),
            box_delivery_base: r.decimal("box_delivery_base", &record.box_delivery_base)?,
            box_delivery_coef_expr: r
                .coefficient("box_delivery_coef_expr", &record.box_delivery_coef_expr)?,
            box_delivery_liter: r.decimal("box_delivery_liter", &record.box_delivery_liter)?,
            box_delivery_marketplace_base: r.decimal(
                "box_delivery_marketplace_base",
                &record.box_delivery_marketplace_base,
            )?,
            box_delivery_marketplace_coef_expr: r.coefficient(
                "box_delivery_marketplace_coef_expr",
                &record.box_delivery_marketplace_coef_expr,
            )?,
            box_delivery_marketplace_liter: r.decimal(
                "box_delivery_marketplace_liter",
                &record.box_delivery_marketplace_liter,
            )?,
            box_storage_base: r.decimal("box_storage_base", &record.box_storage_base)?,
            box_storage_coef_expr: r
                .coefficient("box_storage_coef_expr", &record.box_storage_coef_expr)?,
            box_storage_liter: r.decimal("box_storage_liter", &record.box_storage_liter)?,
        };

        out.nulled_fields += r.nulled;
        out.rows.push(row);
    }

    Ok(out)
}
