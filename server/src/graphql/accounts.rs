use async_graphql::{Context, Enum, ID, InputObject, Object, SimpleObject};
use chrono::{DateTime, Utc};
use entity::users;
use platform_api::{ApiError, ApiResult, IntoGraphql};
use platform_authn::{AuthnError, hash_password, verify_password};
use platform_authz::Role;
use platform_db::{role_from_entity, role_to_entity};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DbErr, EntityTrait, QueryFilter, SqlErr,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{GraphqlData, db_error, graphql_data, guard, guard_principal, operations};

const INVALID_CREDENTIALS: &str = "invalid credentials";
const EMAIL_TAKEN: &str = "there is a user with that email already";

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[graphql(name = "UserRole")]
pub enum AccountRole {
    #[graphql(name = "CLIENT")]
    Client,
    #[graphql(name = "OWNER")]
    Owner,
    #[graphql(name = "DELIVERY")]
    Delivery,
}

impl From<AccountRole> for Role {
    fn from(value: AccountRole) -> Self {
        match value {
            AccountRole::Client => Role::Client,
            AccountRole::Owner => Role::Owner,
            AccountRole::Delivery => Role::Delivery,
        }
    }
}

impl From<Role> for AccountRole {
    fn from(value: Role) -> Self {
        match value {
            Role::Client => AccountRole::Client,
            Role::Owner => AccountRole::Owner,
            Role::Delivery => AccountRole::Delivery,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct UserNode {
    pub id: ID,
    pub email: String,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserNode {
    fn from(model: users::Model) -> Self {
        Self {
            id: ID(model.id.to_string()),
            email: model.email,
            role: role_from_entity(model.role).into(),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, InputObject)]
pub struct CreateAccountInput {
    pub email: String,
    pub password: String,
    pub role: AccountRole,
}

#[derive(Debug, InputObject)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, InputObject)]
pub struct EditProfileInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CreateAccountPayload {
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct LoginPayload {
    pub ok: bool,
    pub token: Option<String>,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct AccountQuery;

#[derive(Default)]
pub struct AccountMutation;

#[Object]
impl AccountQuery {
    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<UserNode> {
        load_me(ctx).await.into_graphql()
    }
}

#[Object]
impl AccountMutation {
    #[instrument(name = "graphql.create_account", skip_all)]
    async fn create_account(
        &self,
        ctx: &Context<'_>,
        input: CreateAccountInput,
    ) -> async_graphql::Result<CreateAccountPayload> {
        create_account(ctx, input).await.into_graphql()
    }

    #[instrument(name = "graphql.login", skip_all)]
    async fn login(
        &self,
        ctx: &Context<'_>,
        input: LoginInput,
    ) -> async_graphql::Result<LoginPayload> {
        login(ctx, input).await.into_graphql()
    }

    #[instrument(name = "graphql.edit_profile", skip_all)]
    async fn edit_profile(
        &self,
        ctx: &Context<'_>,
        input: EditProfileInput,
    ) -> async_graphql::Result<UserNode> {
        edit_profile(ctx, input).await.into_graphql()
    }
}

async fn load_me(ctx: &Context<'_>) -> ApiResult<UserNode> {
    let principal = guard_principal(ctx, operations::ME)?;
    let data = graphql_data(ctx)?;
    users::Entity::find_by_id(principal.id)
        .one(&data.pool)
        .await
        .map_err(db_error)?
        .map(UserNode::from)
        .ok_or(ApiError::NotFound)
}

async fn create_account(
    ctx: &Context<'_>,
    input: CreateAccountInput,
) -> ApiResult<CreateAccountPayload> {
    guard(ctx, operations::CREATE_ACCOUNT)?;
    let data = graphql_data(ctx)?;
    let email = normalize_email(&input.email)?;
    if find_by_email(data, &email).await?.is_some() {
        return Ok(CreateAccountPayload {
            ok: false,
            error: Some(EMAIL_TAKEN.into()),
        });
    }
    let password_hash = match hash_password(&input.password) {
        Ok(hash) => hash,
        Err(err @ AuthnError::WeakPassword(_)) => {
            return Ok(CreateAccountPayload {
                ok: false,
                error: Some(err.to_string()),
            });
        }
        Err(err) => return Err(ApiError::internal(err.into())),
    };
    let now = Utc::now();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(role_to_entity(input.role.into())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&data.pool)
    .await;
    let user = match user {
        Ok(user) => user,
        Err(err) if is_unique_violation(&err) => {
            return Ok(CreateAccountPayload {
                ok: false,
                error: Some(EMAIL_TAKEN.into()),
            });
        }
        Err(err) => return Err(db_error(err)),
    };
    info!(user_id = %user.id, role = ?user.role, "account created");
    Ok(CreateAccountPayload {
        ok: true,
        error: None,
    })
}

async fn login(ctx: &Context<'_>, input: LoginInput) -> ApiResult<LoginPayload> {
    guard(ctx, operations::LOGIN)?;
    let data = graphql_data(ctx)?;
    let rejected = LoginPayload {
        ok: false,
        token: None,
        error: Some(INVALID_CREDENTIALS.into()),
    };
    let Ok(email) = normalize_email(&input.email) else {
        return Ok(rejected);
    };
    let Some(user) = find_by_email(data, &email).await? else {
        return Ok(rejected);
    };
    if !verify_password(&input.password, &user.password_hash) {
        return Ok(rejected);
    }
    let token = data
        .tokens
        .issue(user.id)
        .map_err(|err| ApiError::internal(err.into()))?;
    Ok(LoginPayload {
        ok: true,
        token: Some(token),
        error: None,
    })
}

async fn edit_profile(ctx: &Context<'_>, input: EditProfileInput) -> ApiResult<UserNode> {
    let principal = guard_principal(ctx, operations::EDIT_PROFILE)?;
    let data = graphql_data(ctx)?;
    let user = users::Entity::find_by_id(principal.id)
        .one(&data.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound)?;
    let mut active: users::ActiveModel = user.into();
    if let Some(raw) = input.email.as_deref() {
        let email = normalize_email(raw)?;
        if let Some(existing) = find_by_email(data, &email).await? {
            if existing.id != principal.id {
                return Err(ApiError::invalid(EMAIL_TAKEN));
            }
        }
        active.email = Set(email);
    }
    if let Some(password) = input.password.as_deref() {
        let hash = hash_password(password).map_err(|err| match err {
            AuthnError::WeakPassword(_) => ApiError::invalid(err.to_string()),
            other => ApiError::internal(other.into()),
        })?;
        active.password_hash = Set(hash);
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&data.pool).await.map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::invalid(EMAIL_TAKEN)
        } else {
            db_error(err)
        }
    })?;
    Ok(updated.into())
}

/// The email pre-checks race with concurrent writers; the unique index decides.
fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn find_by_email(data: &GraphqlData, email: &str) -> ApiResult<Option<users::Model>> {
    users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(&data.pool)
        .await
        .map_err(db_error)
}

fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(ApiError::invalid("invalid email"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::Fixture;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email("  Ada@Eats.TEST ").unwrap(),
            "ada@eats.test"
        );
        assert!(normalize_email("ada").is_err());
        assert!(normalize_email("@eats.test").is_err());
        assert!(normalize_email("ada@localhost").is_err());
    }

    #[tokio::test]
    async fn sign_up_then_log_in_then_read_me() {
        let fx = Fixture::new().await;
        let created = fx
            .execute(
                r#"mutation { createAccount(input: { email: "Rider@Eats.test", password: "pedal-hard", role: DELIVERY }) { ok error } }"#,
                None,
            )
            .await;
        assert_eq!(
            Fixture::json(created),
            json!({ "createAccount": { "ok": true, "error": null } })
        );

        let login = fx
            .execute(
                r#"mutation { login(input: { email: "rider@eats.test", password: "pedal-hard" }) { ok token error } }"#,
                None,
            )
            .await;
        let body = Fixture::json(login);
        assert_eq!(body["login"]["ok"], json!(true));
        let token = body["login"]["token"].as_str().unwrap().to_string();

        let principal = fx.resolve(&token).await.unwrap();
        assert_eq!(principal.role, Role::Delivery);
        let me = fx.execute("{ me { email role } }", Some(principal)).await;
        assert_eq!(
            Fixture::json(me),
            json!({ "me": { "email": "rider@eats.test", "role": "DELIVERY" } })
        );
    }

    #[tokio::test]
    async fn duplicate_emails_are_reported_not_raised() {
        let fx = Fixture::new().await;
        fx.user("owner@eats.test", Role::Owner).await;
        let response = fx
            .execute(
                r#"mutation { createAccount(input: { email: "owner@eats.test", password: "long-enough", role: CLIENT }) { ok error } }"#,
                None,
            )
            .await;
        assert_eq!(
            Fixture::json(response),
            json!({ "createAccount": { "ok": false, "error": EMAIL_TAKEN } })
        );
    }

    #[tokio::test]
    async fn weak_passwords_are_reported() {
        let fx = Fixture::new().await;
        let response = fx
            .execute(
                r#"mutation { createAccount(input: { email: "a@eats.test", password: "short", role: CLIENT }) { ok error } }"#,
                None,
            )
            .await;
        let body = Fixture::json(response);
        assert_eq!(body["createAccount"]["ok"], json!(false));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_alike() {
        let fx = Fixture::new().await;
        fx.user("client@eats.test", Role::Client).await;
        let wrong = fx
            .execute(
                r#"mutation { login(input: { email: "client@eats.test", password: "not-the-password" }) { ok token error } }"#,
                None,
            )
            .await;
        let unknown = fx
            .execute(
                r#"mutation { login(input: { email: "ghost@eats.test", password: "not-the-password" }) { ok token error } }"#,
                None,
            )
            .await;
        let wrong = Fixture::json(wrong);
        assert_eq!(wrong, Fixture::json(unknown));
        assert_eq!(wrong["login"]["error"], json!(INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn edit_profile_changes_email_and_rejects_collisions() {
        let fx = Fixture::new().await;
        let client = fx.user("client@eats.test", Role::Client).await;
        fx.user("taken@eats.test", Role::Owner).await;

        let clash = fx
            .execute(
                r#"mutation { editProfile(input: { email: "taken@eats.test" }) { email } }"#,
                Some(client),
            )
            .await;
        assert_eq!(Fixture::error_code(&clash), Some("INVALID_INPUT".into()));

        let renamed = fx
            .execute(
                r#"mutation { editProfile(input: { email: "new@eats.test", password: "fresh-password" }) { email } }"#,
                Some(client),
            )
            .await;
        assert_eq!(
            Fixture::json(renamed),
            json!({ "editProfile": { "email": "new@eats.test" } })
        );

        let login = fx
            .execute(
                r#"mutation { login(input: { email: "new@eats.test", password: "fresh-password" }) { ok } }"#,
                None,
            )
            .await;
        assert_eq!(Fixture::json(login), json!({ "login": { "ok": true } }));
    }

    #[tokio::test]
    async fn simultaneous_sign_ups_with_one_email_report_the_clash() {
        let fx = Fixture::new().await;
        let sign_up = r#"mutation { createAccount(input: { email: "twin@eats.test", password: "same-password", role: CLIENT }) { ok error } }"#;
        let (a, b) = tokio::join!(fx.execute(sign_up, None), fx.execute(sign_up, None));
        let mut outcomes = [Fixture::json(a), Fixture::json(b)]
            .map(|body| body["createAccount"].clone())
            .to_vec();
        outcomes.sort_by_key(|outcome| outcome["ok"].as_bool());
        assert_eq!(
            outcomes,
            vec![
                json!({ "ok": false, "error": EMAIL_TAKEN }),
                json!({ "ok": true, "error": null }),
            ]
        );
    }

    #[tokio::test]
    async fn unique_index_violations_are_recognised() {
        let fx = Fixture::new().await;
        fx.user("dup@eats.test", Role::Client).await;
        let now = Utc::now();
        let err = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set("dup@eats.test".into()),
            password_hash: Set("unused".into()),
            role: Set(role_to_entity(Role::Owner)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&fx.state().pool)
        .await
        .unwrap_err();
        assert!(is_unique_violation(&err), "{err:?}");
    }
}
