use sea_orm::prelude::{DateTimeWithTimeZone, *};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{restaurants, users};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub customer_id: Uuid,
    #[sea_orm(indexed)]
    pub restaurant_id: Uuid,
    #[sea_orm(indexed)]
    pub driver_id: Option<Uuid>,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Deserialize, Serialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "COOKING")]
    Cooking,
    #[sea_orm(string_value = "COOKED")]
    Cooked,
    #[sea_orm(string_value = "PICKED_UP")]
    PickedUp,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "users::Entity",
        from = "Column::CustomerId",
        to = "users::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "users::Entity",
        from = "Column::DriverId",
        to = "users::Column::Id",
        on_delete = "SetNull"
    )]
    Driver,
    #[sea_orm(
        belongs_to = "restaurants::Entity",
        from = "Column::RestaurantId",
        to = "restaurants::Column::Id",
        on_delete = "Cascade"
    )]
    Restaurant,
}

impl Related<restaurants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Restaurant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
