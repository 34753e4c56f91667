pub use sea_orm_migration::prelude::*;

mod m20240101_000001_accounts;
mod m20240102_000002_restaurants_and_orders;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_accounts::Migration),
            Box::new(m20240102_000002_restaurants_and_orders::Migration),
        ]
    }
}
