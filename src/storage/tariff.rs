use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;

/// Снимок тарифа склада на дату (таблица `tariffs`)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tariffs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub date: Date,
    pub warehouse_name: String,
    #[sea_orm(nullable)]
    pub geo_name: Option<String>,
    #[sea_orm(nullable)]
    pub box_delivery_base: Option<f64>,
    #[sea_orm(nullable)]
    pub box_delivery_coef_expr: Option<i32>,
    #[sea_orm(nullable)]
    pub box_delivery_liter: Option<f64>,
    #[sea_orm(nullable)]
    pub box_delivery_marketplace_base: Option<f64>,
    #[sea_orm(nullable)]
    pub box_delivery_marketplace_coef_expr: Option<i32>,
    #[sea_orm(nullable)]
    pub box_delivery_marketplace_liter: Option<f64>,
    #[sea_orm(nullable)]
    pub box_storage_base: Option<f64>,
    #[sea_orm(nullable)]
    pub box_storage_coef_expr: Option<i32>,
    #[sea_orm(nullable)]
    pub box_storage_liter: Option<f64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Нормализованная строка тарифа для вставки (без даты, id и отметок времени)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTariff {
    pub warehouse_name: String,
    pub geo_name: Option<String>,
    pub box_delivery_base: Option<f64>,
    pub box_delivery_coef_expr: Option<i32>,
    pub box_delivery_liter: Option<f64>,
    pub box_delivery_marketplace_base: Option<f64>,
    pub box_delivery_marketplace_coef_expr: Option<i32>,
    pub box_delivery_marketplace_liter: Option<f64>,
    pub box_storage_base: Option<f64>,
    pub box_storage_coef_expr: Option<i32>,
    pub box_storage_liter: Option<f64>,
}

impl NewTariff {
    pub fn to_active_model(&self, date: Date, now: DateTimeUtc) -> ActiveModel {
        ActiveModel {
            id: NotSet,
            date: Set(date),
            warehouse_name: Set(self.warehouse_name.clone()),
            geo_name: Set(self.geo_name.clone()),
            box_delivery_base: Set(self.box_delivery_base),
            box_delivery_coef_expr: Set(self.box_delivery_coef_expr),
            box_delivery_liter: Set(self.box_delivery_liter),
            box_delivery_marketplace_base: Set(self.box_delivery_marketplace_base),
            box_delivery_marketplace_coef_expr: Set(self.box_delivery_marketplace_coef_expr),
            box_delivery_marketplace_liter: Set(self.box_delivery_marketplace_liter),
            box_storage_base: Set(self.box_storage_base),
            box_storage_coef_expr: Set(self.box_storage_coef_expr),
            box_storage_liter: Set(self.box_storage_liter),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }
}

impl From<&Model> for NewTariff {
    fn from(m: &Model) -> Self {
        Self {
            warehouse_name: m.warehouse_name.clone(),
            geo_name: m.geo_name.clone(),
            box_delivery_base: m.box_delivery_base,
            box_delivery_coef_expr: m.box_delivery_coef_expr,
            box_delivery_liter: m.box_delivery_liter,
            box_delivery_marketplace_base: m.box_delivery_marketplace_base,
            box_delivery_marketplace_coef_expr: m.box_delivery_marketplace_coef_expr,
            box_delivery_marketplace_liter: m.box_delivery_marketplace_liter,
            box_storage_base: m.box_storage_base,
            box_storage_coef_expr: m.box_storage_coef_expr,
            box_storage_liter: m.box_storage_liter,
        }
    }
}
