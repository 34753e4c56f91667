use async_graphql::{Context, ID, InputObject, Object, SimpleObject};
use chrono::{DateTime, Utc};
use entity::restaurants;
use platform_api::{ApiError, ApiResult, IntoGraphql};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{db_error, graphql_data, guard, guard_principal, operations, page, parse_id};

#[derive(Clone, Debug, SimpleObject)]
pub struct RestaurantNode {
    pub id: ID,
    pub name: String,
    pub address: String,
    pub cover_image: Option<String>,
    pub owner_id: ID,
    pub created_at: DateTime<Utc>,
}

impl From<restaurants::Model> for RestaurantNode {
    fn from(model: restaurants::Model) -> Self {
        Self {
            id: ID(model.id.to_string()),
            name: model.name,
            address: model.address,
            cover_image: model.cover_image,
            owner_id: ID(model.owner_id.to_string()),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, InputObject)]
pub struct CreateRestaurantInput {
    pub name: String,
    pub address: String,
    pub cover_image: Option<String>,
}

#[derive(Default)]
pub struct RestaurantQuery;

#[derive(Default)]
pub struct RestaurantMutation;

#[Object]
impl RestaurantQuery {
    #[instrument(name = "graphql.restaurants", skip_all)]
    async fn restaurants(
        &self,
        ctx: &Context<'_>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<RestaurantNode>> {
        list_restaurants(ctx, first, offset).await.into_graphql()
    }

    #[instrument(name = "graphql.restaurant", skip_all)]
    async fn restaurant(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<RestaurantNode> {
        find_restaurant(ctx, &id).await.into_graphql()
    }

    #[instrument(name = "graphql.my_restaurants", skip_all)]
    async fn my_restaurants(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<RestaurantNode>> {
        owned_restaurants(ctx).await.into_graphql()
    }
}

#[Object]
impl RestaurantMutation {
    #[instrument(name = "graphql.create_restaurant", skip_all)]
    async fn create_restaurant(
        &self,
        ctx: &Context<'_>,
        input: CreateRestaurantInput,
    ) -> async_graphql::Result<RestaurantNode> {
        create_restaurant(ctx, input).await.into_graphql()
    }
}

async fn list_restaurants(
    ctx: &Context<'_>,
    first: Option<i32>,
    offset: Option<i32>,
) -> ApiResult<Vec<RestaurantNode>> {
    guard(ctx, operations::RESTAURANTS)?;
    let data = graphql_data(ctx)?;
    let (limit, skip) = page(first, offset);
    let records = restaurants::Entity::find()
        .order_by_asc(restaurants::Column::Name)
        .limit(limit)
        .offset(skip)
        .all(&data.pool)
        .await
        .map_err(db_error)?;
    Ok(records.into_iter().map(RestaurantNode::from).collect())
}

async fn find_restaurant(ctx: &Context<'_>, id: &ID) -> ApiResult<RestaurantNode> {
    guard(ctx, operations::RESTAURANT)?;
    let data = graphql_data(ctx)?;
    restaurants::Entity::find_by_id(parse_id(id)?)
        .one(&data.pool)
        .await
        .map_err(db_error)?
        .map(RestaurantNode::from)
        .ok_or(ApiError::NotFound)
}

async fn owned_restaurants(ctx: &Context<'_>) -> ApiResult<Vec<RestaurantNode>> {
    let owner = guard_principal(ctx, operations::MY_RESTAURANTS)?;
    let data = graphql_data(ctx)?;
    let records = restaurants::Entity::find()
        .filter(restaurants::Column::OwnerId.eq(owner.id))
        .order_by_asc(restaurants::Column::Name)
        .all(&data.pool)
        .await
        .map_err(db_error)?;
    Ok(records.into_iter().map(RestaurantNode::from).collect())
}

async fn create_restaurant(
    ctx: &Context<'_>,
    input: CreateRestaurantInput,
) -> ApiResult<RestaurantNode> {
    let owner = guard_principal(ctx, operations::CREATE_RESTAURANT)?;
    let data = graphql_data(ctx)?;
    let name = required("name", &input.name)?;
    let address = required("address", &input.address)?;
    let cover_image = input
        .cover_image
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    let record = restaurants::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        address: Set(address),
        cover_image: Set(cover_image),
        owner_id: Set(owner.id),
        created_at: Set(Utc::now().into()),
    }
    .insert(&data.pool)
    .await
    .map_err(db_error)?;
    info!(restaurant_id = %record.id, owner_id = %owner.id, "restaurant created");
    Ok(record.into())
}

fn required(field: &str, value: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::invalid(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use platform_authz::Role;
    use serde_json::json;

    use crate::testing::Fixture;

    #[tokio::test]
    async fn owners_create_and_list_their_restaurants() {
        let fx = Fixture::new().await;
        let owner = fx.user("owner@eats.test", Role::Owner).await;
        let other = fx.user("rival@eats.test", Role::Owner).await;
        fx.restaurant(other, "Rival Ramen").await;

        let created = fx
            .execute(
                r#"mutation { createRestaurant(input: { name: " Bao House ", address: "2 Dock Rd" }) { name address coverImage } }"#,
                Some(owner),
            )
            .await;
        assert_eq!(
            Fixture::json(created),
            json!({ "createRestaurant": { "name": "Bao House", "address": "2 Dock Rd", "coverImage": null } })
        );

        let mine = fx.execute("{ myRestaurants { name } }", Some(owner)).await;
        assert_eq!(
            Fixture::json(mine),
            json!({ "myRestaurants": [{ "name": "Bao House" }] })
        );

        let everyone = fx.execute("{ restaurants { name } }", None).await;
        assert_eq!(
            Fixture::json(everyone),
            json!({ "restaurants": [{ "name": "Bao House" }, { "name": "Rival Ramen" }] })
        );
    }

    #[tokio::test]
    async fn blank_names_are_invalid() {
        let fx = Fixture::new().await;
        let owner = fx.user("owner@eats.test", Role::Owner).await;
        let response = fx
            .execute(
                r#"mutation { createRestaurant(input: { name: "  ", address: "2 Dock Rd" }) { id } }"#,
                Some(owner),
            )
            .await;
        assert_eq!(Fixture::error_code(&response), Some("INVALID_INPUT".into()));
    }

    #[tokio::test]
    async fn single_restaurant_lookup_is_public() {
        let fx = Fixture::new().await;
        let owner = fx.user("owner@eats.test", Role::Owner).await;
        let id = fx.restaurant(owner, "Taco Stop").await;

        let found = fx
            .execute(&format!(r#"{{ restaurant(id: "{id}") {{ name }} }}"#), None)
            .await;
        assert_eq!(
            Fixture::json(found),
            json!({ "restaurant": { "name": "Taco Stop" } })
        );

        let missing = fx
            .execute(
                &format!(r#"{{ restaurant(id: "{}") {{ name }} }}"#, uuid::Uuid::new_v4()),
                None,
            )
            .await;
        assert_eq!(Fixture::error_code(&missing), Some("NOT_FOUND".into()));

        let garbage = fx
            .execute(r#"{ restaurant(id: "nope") { name } }"#, None)
            .await;
        assert_eq!(Fixture::error_code(&garbage), Some("INVALID_INPUT".into()));
    }

    #[tokio::test]
    async fn my_restaurants_is_owner_only() {
        let fx = Fixture::new().await;
        let rider = fx.user("rider@eats.test", Role::Delivery).await;
        let response = fx.execute("{ myRestaurants { name } }", Some(rider)).await;
        assert_eq!(Fixture::error_code(&response), Some("FORBIDDEN".into()));
    }
}
