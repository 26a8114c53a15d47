use serde::{Deserialize, Deserializer, Serialize};

/// Ответ `GET /api/v1/tariffs/box`
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffsBoxResponse {
    pub response: Option<TariffsBoxEnvelope>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffsBoxEnvelope {
    pub data: Option<TariffsBoxData>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffsBoxData {
    #[serde(rename = "dtNextBox")]
    pub dt_next_box: Option<String>,

    #[serde(rename = "dtTillMax")]
    pub dt_till_max: Option<String>,

    #[serde(rename = "warehouseList")]
    pub warehouse_list: Option<Vec<WarehouseTariff>>,
}

impl TariffsBoxResponse {
    /// Список складов, если ответ содержит ожидаемую структуру
    pub fn into_warehouse_list(self) -> Option<Vec<WarehouseTariff>> {
        self.response?.data?.warehouse_list
    }
}

/// Тариф одного склада на дату в том виде, в каком его отдаёт WB.
///
/// Числа приходят строками: `"-"` означает отсутствие значения,
/// дробная часть отделяется запятой (`"12,5"`).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseTariff {
    #[serde(default, rename = "warehouseName", deserialize_with = "text_or_empty")]
    pub warehouse_name: String,

    #[serde(default, rename = "geoName", deserialize_with = "text_or_number")]
    pub geo_name: Option<String>,

    #[serde(default, rename = "boxDeliveryBase", deserialize_with = "text_or_number")]
    pub box_delivery_base: Option<String>,

    #[serde(default, rename = "boxDeliveryCoefExpr", deserialize_with = "text_or_number")]
    pub box_delivery_coef_expr: Option<String>,

    #[serde(default, rename = "boxDeliveryLiter", deserialize_with = "text_or_number")]
    pub box_delivery_liter: Option<String>,

    #[serde(
        default,
        rename = "boxDeliveryMarketplaceBase",
        deserialize_with = "text_or_number"
    )]
    pub box_delivery_marketplace_base: Option<String>,

    #[serde(
        default,
        rename = "boxDeliveryMarketplaceCoefExpr",
        deserialize_with = "text_or_number"
    )]
    pub box_delivery_marketplace_coef_expr: Option<String>,

    #[serde(
        default,
        rename = "boxDeliveryMarketplaceLiter",
        deserialize_with = "text_or_number"
    )]
    pub box_delivery_marketplace_liter: Option<String>,

    #[serde(default, rename = "boxStorageBase", deserialize_with = "text_or_number")]
    pub box_storage_base: Option<String>,

    #[serde(default, rename = "boxStorageCoefExpr", deserialize_with = "text_or_number")]
    pub box_storage_coef_expr: Option<String>,

    #[serde(default, rename = "boxStorageLiter", deserialize_with = "text_or_number")]
    pub box_storage_liter: Option<String>,
}

/// Принимает строку, число или null и приводит к тексту
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

// null и отсутствующее значение дают пустую строку
fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_or_number(deserializer)?.unwrap_or_default())
}
