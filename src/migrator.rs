// The async-trait expansion of `MigrationTrait` requires the impl to elide
// the `SchemaManager` lifetime exactly as the trait does (E0195), so the
// rust_2018_idioms elision lint must be allowed here.
#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_orders_table::Migration),
            Box::new(m20250101_000002_create_distributor_events_table::Migration),
        ]
    }
}

mod m20250101_000001_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // The unique constraint on source_session_id is what makes webhook
            // redelivery safe: duplicate completion events collide here instead
            // of creating a second order.
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::SourceSessionId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::PaymentReference).string().null())
                        .col(
                            ColumnDef::new(Orders::AmountTotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::DistributorStatus).string().not_null())
                        .col(ColumnDef::new(Orders::Customer).json().not_null())
                        .col(ColumnDef::new(Orders::ShippingAddress).json().not_null())
                        .col(ColumnDef::new(Orders::Items).json().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Orders {
        Table,
        Id,
        SourceSessionId,
        PaymentReference,
        AmountTotal,
        Status,
        DistributorStatus,
        Customer,
        ShippingAddress,
        Items,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_distributor_events_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_distributor_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Append-only audit log; deliberately no uniqueness beyond the pk.
            manager
                .create_table(
                    Table::create()
                        .table(DistributorEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DistributorEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DistributorEvents::EventType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DistributorEvents::Payload).json().not_null())
                        .col(
                            ColumnDef::new(DistributorEvents::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DistributorEvents::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum DistributorEvents {
        Table,
        Id,
        EventType,
        Payload,
        ReceivedAt,
    }
}
