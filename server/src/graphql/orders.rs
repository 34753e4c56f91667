use async_graphql::{Context, Enum, ID, InputObject, Object, SimpleObject};
use chrono::{DateTime, Utc};
use entity::{
    orders::{self, OrderStatus},
    restaurants,
};
use platform_api::{ApiError, ApiResult, IntoGraphql};
use platform_authz::{Principal, Role};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, QueryFilter,
    QueryOrder, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{GraphqlData, db_error, graphql_data, guard_principal, operations, parse_id};

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[graphql(name = "OrderStatus")]
pub enum OrderStatusValue {
    #[graphql(name = "PENDING")]
    Pending,
    #[graphql(name = "COOKING")]
    Cooking,
    #[graphql(name = "COOKED")]
    Cooked,
    #[graphql(name = "PICKED_UP")]
    PickedUp,
    #[graphql(name = "DELIVERED")]
    Delivered,
}

impl From<OrderStatusValue> for OrderStatus {
    fn from(value: OrderStatusValue) -> Self {
        match value {
            OrderStatusValue::Pending => OrderStatus::Pending,
            OrderStatusValue::Cooking => OrderStatus::Cooking,
            OrderStatusValue::Cooked => OrderStatus::Cooked,
            OrderStatusValue::PickedUp => OrderStatus::PickedUp,
            OrderStatusValue::Delivered => OrderStatus::Delivered,
        }
    }
}

impl From<OrderStatus> for OrderStatusValue {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::Pending => OrderStatusValue::Pending,
            OrderStatus::Cooking => OrderStatusValue::Cooking,
            OrderStatus::Cooked => OrderStatusValue::Cooked,
            OrderStatus::PickedUp => OrderStatusValue::PickedUp,
            OrderStatus::Delivered => OrderStatusValue::Delivered,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct OrderNode {
    pub id: ID,
    pub customer_id: ID,
    pub restaurant_id: ID,
    pub driver_id: Option<ID>,
    pub status: OrderStatusValue,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for OrderNode {
    fn from(model: orders::Model) -> Self {
        Self {
            id: ID(model.id.to_string()),
            customer_id: ID(model.customer_id.to_string()),
            restaurant_id: ID(model.restaurant_id.to_string()),
            driver_id: model.driver_id.map(|id| ID(id.to_string())),
            status: model.status.into(),
            total_cents: model.total_cents,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, InputObject)]
pub struct CreateOrderInput {
    pub restaurant_id: ID,
    pub total_cents: i64,
}

#[derive(Debug, InputObject)]
pub struct UpdateOrderInput {
    pub id: ID,
    pub status: OrderStatusValue,
}

#[derive(Default)]
pub struct OrderQuery;

#[derive(Default)]
pub struct OrderMutation;

#[Object]
impl OrderQuery {
    #[instrument(name = "graphql.orders", skip_all)]
    async fn orders(
        &self,
        ctx: &Context<'_>,
        status: Option<OrderStatusValue>,
    ) -> async_graphql::Result<Vec<OrderNode>> {
        visible_orders(ctx, status).await.into_graphql()
    }

    #[instrument(name = "graphql.order", skip_all)]
    async fn order(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<OrderNode> {
        find_order(ctx, &id).await.into_graphql()
    }
}

#[Object]
impl OrderMutation {
    #[instrument(name = "graphql.create_order", skip_all)]
    async fn create_order(
        &self,
        ctx: &Context<'_>,
        input: CreateOrderInput,
    ) -> async_graphql::Result<OrderNode> {
        create_order(ctx, input).await.into_graphql()
    }

    #[instrument(name = "graphql.update_order", skip_all)]
    async fn update_order(
        &self,
        ctx: &Context<'_>,
        input: UpdateOrderInput,
    ) -> async_graphql::Result<OrderNode> {
        update_order(ctx, input).await.into_graphql()
    }

    #[instrument(name = "graphql.take_order", skip_all)]
    async fn take_order(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<OrderNode> {
        take_order(ctx, &id).await.into_graphql()
    }
}

async fn visible_orders(
    ctx: &Context<'_>,
    status: Option<OrderStatusValue>,
) -> ApiResult<Vec<OrderNode>> {
    let principal = guard_principal(ctx, operations::ORDERS)?;
    let data = graphql_data(ctx)?;
    let scope = match principal.role {
        Role::Client => Condition::all().add(orders::Column::CustomerId.eq(principal.id)),
        Role::Delivery => Condition::all().add(orders::Column::DriverId.eq(principal.id)),
        Role::Owner => {
            let owned = owned_restaurant_ids(data, principal.id).await?;
            if owned.is_empty() {
                return Ok(Vec::new());
            }
            Condition::all().add(orders::Column::RestaurantId.is_in(owned))
        }
    };
    let scope = match status {
        Some(status) => scope.add(orders::Column::Status.eq(OrderStatus::from(status))),
        None => scope,
    };
    let records = orders::Entity::find()
        .filter(scope)
        .order_by_desc(orders::Column::CreatedAt)
        .all(&data.pool)
        .await
        .map_err(db_error)?;
    Ok(records.into_iter().map(OrderNode::from).collect())
}

async fn find_order(ctx: &Context<'_>, id: &ID) -> ApiResult<OrderNode> {
    let principal = guard_principal(ctx, operations::ORDER)?;
    let data = graphql_data(ctx)?;
    let order = load_order(data, parse_id(id)?).await?;
    if !can_see(data, &principal, &order).await? {
        return Err(ApiError::Forbidden);
    }
    Ok(order.into())
}

async fn create_order(ctx: &Context<'_>, input: CreateOrderInput) -> ApiResult<OrderNode> {
    let customer = guard_principal(ctx, operations::CREATE_ORDER)?;
    let data = graphql_data(ctx)?;
    if input.total_cents < 0 {
        return Err(ApiError::invalid("total must not be negative"));
    }
    let restaurant_id = parse_id(&input.restaurant_id)?;
    restaurants::Entity::find_by_id(restaurant_id)
        .one(&data.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound)?;
    let now = Utc::now();
    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer.id),
        restaurant_id: Set(restaurant_id),
        driver_id: Set(None),
        status: Set(OrderStatus::Pending),
        total_cents: Set(input.total_cents),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&data.pool)
    .await
    .map_err(db_error)?;
    info!(order_id = %order.id, %restaurant_id, "order placed");
    Ok(order.into())
}

async fn update_order(ctx: &Context<'_>, input: UpdateOrderInput) -> ApiResult<OrderNode> {
    let principal = guard_principal(ctx, operations::UPDATE_ORDER)?;
    let data = graphql_data(ctx)?;
    let order = load_order(data, parse_id(&input.id)?).await?;
    let status = OrderStatus::from(input.status);
    if !can_see(data, &principal, &order).await? || !may_set_status(principal.role, status) {
        return Err(ApiError::Forbidden);
    }
    let order_id = order.id;
    let mut active: orders::ActiveModel = order.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&data.pool).await.map_err(db_error)?;
    info!(%order_id, status = ?status, "order status changed");
    Ok(updated.into())
}

/// The driver is set in one conditional statement, only while none is set.
async fn take_order(ctx: &Context<'_>, id: &ID) -> ApiResult<OrderNode> {
    let driver = guard_principal(ctx, operations::TAKE_ORDER)?;
    let data = graphql_data(ctx)?;
    let order_id = parse_id(id)?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let claimed = orders::Entity::update_many()
        .col_expr(orders::Column::DriverId, Expr::value(driver.id))
        .col_expr(orders::Column::UpdatedAt, Expr::value(now))
        .filter(orders::Column::Id.eq(order_id))
        .filter(orders::Column::DriverId.is_null())
        .exec(&data.pool)
        .await
        .map_err(db_error)?;
    let order = load_order(data, order_id).await?;
    if claimed.rows_affected == 0 {
        return Err(ApiError::invalid("order already has a driver"));
    }
    info!(%order_id, driver_id = %driver.id, "order taken");
    Ok(order.into())
}

async fn load_order(data: &GraphqlData, id: Uuid) -> ApiResult<orders::Model> {
    orders::Entity::find_by_id(id)
        .one(&data.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound)
}

async fn owned_restaurant_ids(data: &GraphqlData, owner_id: Uuid) -> ApiResult<Vec<Uuid>> {
    let owned = restaurants::Entity::find()
        .filter(restaurants::Column::OwnerId.eq(owner_id))
        .all(&data.pool)
        .await
        .map_err(db_error)?;
    Ok(owned.into_iter().map(|restaurant| restaurant.id).collect())
}

/// Customers see their own orders, drivers the ones assigned to them, owners
/// the orders placed at their restaurants.
async fn can_see(data: &GraphqlData, principal: &Principal, order: &orders::Model) -> ApiResult<bool> {
    Ok(match principal.role {
        Role::Client => order.customer_id == principal.id,
        Role::Delivery => order.driver_id == Some(principal.id),
        Role::Owner => restaurants::Entity::find_by_id(order.restaurant_id)
            .one(&data.pool)
            .await
            .map_err(db_error)?
            .is_some_and(|restaurant| restaurant.owner_id == principal.id),
    })
}

fn may_set_status(role: Role, status: OrderStatus) -> bool {
    match role {
        Role::Owner => matches!(status, OrderStatus::Cooking | OrderStatus::Cooked),
        Role::Delivery => matches!(status, OrderStatus::PickedUp | OrderStatus::Delivered),
        Role::Client => false,
    }
}
