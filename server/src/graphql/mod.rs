mod accounts;
pub mod operations;
mod orders;
mod restaurants;

use anyhow::anyhow;
use async_graphql::{Context, EmptySubscription, ID, MergedObject, Schema};
use platform_api::{ApiError, ApiResult, ensure_allowed};
use platform_authn::TokenCodec;
use platform_authz::{Gatekeeper, Principal};
use platform_db::DbPool;
use sea_orm::DbErr;
use uuid::Uuid;

use self::{
    accounts::{AccountMutation, AccountQuery},
    orders::{OrderMutation, OrderQuery},
    restaurants::{RestaurantMutation, RestaurantQuery},
};

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

#[derive(MergedObject, Default)]
pub struct QueryRoot(AccountQuery, RestaurantQuery, OrderQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(AccountMutation, RestaurantMutation, OrderMutation);

/// Process-wide collaborators available to every resolver.
#[derive(Clone, Debug)]
pub struct GraphqlData {
    pub pool: DbPool,
    pub gatekeeper: Gatekeeper,
    pub tokens: TokenCodec,
}

/// Principal resolved for the current request, attached by the HTTP layer.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestPrincipal(pub Option<Principal>);

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(data)
        .finish()
}

/// SDL of the schema; needs no runtime data.
pub fn sdl() -> String {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .finish()
        .sdl()
}

const DEFAULT_PAGE: i32 = 20;
const MAX_PAGE: i32 = 100;

fn graphql_data<'a>(ctx: &Context<'a>) -> ApiResult<&'a GraphqlData> {
    ctx.data::<GraphqlData>()
        .map_err(|_| ApiError::internal(anyhow!("missing graphql data")))
}

fn request_principal(ctx: &Context<'_>) -> Option<Principal> {
    ctx.data_opt::<RequestPrincipal>()
        .and_then(|attached| attached.0)
}

/// Check `operation` against the role registry for the current request.
fn guard(ctx: &Context<'_>, operation: &str) -> ApiResult<Option<Principal>> {
    let data = graphql_data(ctx)?;
    let principal = request_principal(ctx);
    ensure_allowed(data.gatekeeper.check(operation, principal.as_ref()))?;
    Ok(principal)
}

/// Like [`guard`] for operations that declared roles, where passing the guard
/// implies a principal.
fn guard_principal(ctx: &Context<'_>, operation: &str) -> ApiResult<Principal> {
    guard(ctx, operation)?.ok_or(ApiError::Forbidden)
}

fn page(first: Option<i32>, offset: Option<i32>) -> (u64, u64) {
    let limit = first.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE) as u64;
    let skip = offset.unwrap_or(0).max(0) as u64;
    (limit, skip)
}

fn parse_id(id: &ID) -> ApiResult<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| ApiError::invalid("invalid id"))
}

fn db_error(err: DbErr) -> ApiError {
    ApiError::internal(err.into())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use platform_authz::Role;

    use super::*;
    use crate::testing::Fixture;

    #[test]
    fn every_operation_is_a_root_field() {
        let schema = sdl();
        for op in operations::ALL {
            let declared = schema.lines().map(str::trim_start).any(|line| {
                line.starts_with(&format!("{op}(")) || line.starts_with(&format!("{op}:"))
            });
            assert!(declared, "{op} missing from schema");
        }
    }

    #[test]
    fn pages_are_clamped() {
        assert_eq!(page(None, None), (20, 0));
        assert_eq!(page(Some(0), Some(-4)), (1, 0));
        assert_eq!(page(Some(1_000), Some(40)), (100, 40));
    }

    #[tokio::test]
    async fn public_queries_need_no_principal() {
        let fx = Fixture::new().await;
        let response = fx.execute("{ restaurants { name } }", None).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({ "restaurants": [] })
        );
    }

    #[tokio::test]
    async fn declared_queries_reject_anonymous_callers() {
        let fx = Fixture::new().await;
        let response = fx.execute("{ me { email } }", None).await;
        assert_eq!(Fixture::error_code(&response), Some("FORBIDDEN".into()));
    }

    #[tokio::test]
    async fn role_mismatch_is_forbidden() {
        let fx = Fixture::new().await;
        let client = fx.user("client@eats.test", Role::Client).await;
        let response = fx
            .execute(
                r#"mutation { createRestaurant(input: { name: "Nope", address: "1 Main St" }) { id } }"#,
                Some(client),
            )
            .await;
        assert_eq!(Fixture::error_code(&response), Some("FORBIDDEN".into()));
    }
}
