use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_directory_tables::Migration),
            Box::new(m20250101_000002_create_users_table::Migration),
            Box::new(m20250101_000003_create_orders_table::Migration),
            Box::new(m20250101_000004_create_settings_table::Migration),
            Box::new(m20250101_000005_create_schedule_entries_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_directory_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_directory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Stores::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(ColumnDef::new(Stores::Address).string().null())
                        .col(ColumnDef::new(Stores::Phone).string().null())
                        .col(ColumnDef::new(Stores::Email).string().null())
                        .col(
                            ColumnDef::new(Stores::Status)
                                .string()
                                .not_null()
                                .default("active"),
                        )
                        .col(ColumnDef::new(Stores::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Stores::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Companies::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Companies::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Companies::Name).string().not_null())
                        .col(ColumnDef::new(Companies::Nip).string().null())
                        .col(ColumnDef::new(Companies::Address).string().null())
                        .col(ColumnDef::new(Companies::Phone).string().null())
                        .col(ColumnDef::new(Companies::Email).string().null())
                        .col(
                            ColumnDef::new(Companies::Status)
                                .string()
                                .not_null()
                                .default("active"),
                        )
                        .col(ColumnDef::new(Companies::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Companies::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CompanyStores::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CompanyStores::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(CompanyStores::CompanyId).integer().not_null())
                        .col(ColumnDef::new(CompanyStores::StoreId).integer().not_null())
                        .col(
                            ColumnDef::new(CompanyStores::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_company_stores_company")
                                .from(CompanyStores::Table, CompanyStores::CompanyId)
                                .to(Companies::Table, Companies::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_company_stores_store")
                                .from(CompanyStores::Table, CompanyStores::StoreId)
                                .to(Stores::Table, Stores::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_company_stores_pair")
                        .table(CompanyStores::Table)
                        .col(CompanyStores::CompanyId)
                        .col(CompanyStores::StoreId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CompanyStores::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Companies::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stores::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Stores {
        Table,
        Id,
        Name,
        Address,
        Phone,
        Email,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Companies {
        Table,
        Id,
        Name,
        Nip,
        Address,
        Phone,
        Email,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CompanyStores {
        Table,
        Id,
        CompanyId,
        StoreId,
        CreatedAt,
    }
}

mod m20250101_000002_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Phone).string().null())
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(ColumnDef::new(Users::Role).string().not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Users::StoreId).integer().null())
                        .col(ColumnDef::new(Users::Position).string().null())
                        .col(ColumnDef::new(Users::CompanyId).integer().null())
                        .col(ColumnDef::new(Users::CompanyName).string().null())
                        .col(ColumnDef::new(Users::Nip).string().null())
                        .col(ColumnDef::new(Users::CompanyAddress).string().null())
                        .col(ColumnDef::new(Users::Services).string().null())
                        .col(
                            ColumnDef::new(Users::CompanyOwnerOnly)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Users::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Users::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_role")
                        .table(Users::Table)
                        .col(Users::Role)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_company_id")
                        .table(Users::Table)
                        .col(Users::CompanyId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        Phone,
        PasswordHash,
        Role,
        IsActive,
        StoreId,
        Position,
        CompanyId,
        CompanyName,
        Nip,
        CompanyAddress,
        Services,
        CompanyOwnerOnly,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000003_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::ClientName).string().not_null())
                        .col(ColumnDef::new(Orders::ClientPhone).string().null())
                        .col(ColumnDef::new(Orders::InstallationAddress).string().not_null())
                        .col(ColumnDef::new(Orders::StoreId).integer().null())
                        .col(ColumnDef::new(Orders::StoreName).string().null())
                        .col(ColumnDef::new(Orders::CompanyId).integer().null())
                        .col(ColumnDef::new(Orders::CompanyName).string().null())
                        .col(ColumnDef::new(Orders::InstallerId).integer().null())
                        .col(ColumnDef::new(Orders::TransporterId).integer().null())
                        .col(ColumnDef::new(Orders::ServiceType).string().not_null())
                        .col(
                            ColumnDef::new(Orders::WithTransport)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::ProposedDate).string().null())
                        .col(ColumnDef::new(Orders::InstallationDate).date().null())
                        .col(ColumnDef::new(Orders::TransportDate).date().null())
                        .col(
                            ColumnDef::new(Orders::InstallationStatus)
                                .string()
                                .not_null()
                                .default("new"),
                        )
                        .col(ColumnDef::new(Orders::TransportStatus).string().null())
                        .col(ColumnDef::new(Orders::DeliveryStatus).string().null())
                        .col(
                            ColumnDef::new(Orders::DocumentsProvided)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::WillBeSettled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::InvoiceIssued)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::ComplaintNotes).text().null())
                        .col(ColumnDef::new(Orders::ComplaintPhotos).json().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderValue)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::WarehouseValue)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::ServiceValue)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(ColumnDef::new(Orders::Comments).json().not_null())
                        .col(ColumnDef::new(Orders::UserId).integer().null())
                        .col(ColumnDef::new(Orders::UserName).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            // Lookup indexes for the scoped list views
            for (name, column) in [
                ("idx_orders_store_id", Orders::StoreId),
                ("idx_orders_company_id", Orders::CompanyId),
                ("idx_orders_installer_id", Orders::InstallerId),
                ("idx_orders_transporter_id", Orders::TransporterId),
                ("idx_orders_installation_status", Orders::InstallationStatus),
                ("idx_orders_created_at", Orders::CreatedAt),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Orders::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        ClientName,
        ClientPhone,
        InstallationAddress,
        StoreId,
        StoreName,
        CompanyId,
        CompanyName,
        InstallerId,
        TransporterId,
        ServiceType,
        WithTransport,
        ProposedDate,
        InstallationDate,
        TransportDate,
        InstallationStatus,
        TransportStatus,
        DeliveryStatus,
        DocumentsProvided,
        WillBeSettled,
        InvoiceIssued,
        ComplaintNotes,
        ComplaintPhotos,
        OrderValue,
        WarehouseValue,
        ServiceValue,
        Notes,
        Comments,
        UserId,
        UserName,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000004_create_settings_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_settings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Settings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Settings::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Settings::Category).string().not_null())
                        .col(ColumnDef::new(Settings::Key).string().not_null())
                        .col(ColumnDef::new(Settings::Value).text().null())
                        .col(ColumnDef::new(Settings::ValueJson).json().null())
                        .col(
                            ColumnDef::new(Settings::ValueType)
                                .string()
                                .not_null()
                                .default("string"),
                        )
                        .col(ColumnDef::new(Settings::Description).string().null())
                        .col(ColumnDef::new(Settings::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_settings_category_key")
                        .table(Settings::Table)
                        .col(Settings::Category)
                        .col(Settings::Key)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Settings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Settings {
        Table,
        Id,
        Category,
        Key,
        Value,
        ValueJson,
        ValueType,
        Description,
        UpdatedAt,
    }
}

mod m20250101_000005_create_schedule_entries_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_schedule_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ScheduleEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ScheduleEntries::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ScheduleEntries::InstallerId).integer().not_null())
                        .col(ColumnDef::new(ScheduleEntries::OrderNumber).string().null())
                        .col(ColumnDef::new(ScheduleEntries::Date).date().not_null())
                        .col(ColumnDef::new(ScheduleEntries::TimeSlot).string().not_null())
                        .col(ColumnDef::new(ScheduleEntries::Notes).text().null())
                        .col(
                            ColumnDef::new(ScheduleEntries::Completed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ScheduleEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ScheduleEntries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Not unique: double booking is detected in the service layer
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_schedule_installer_date")
                        .table(ScheduleEntries::Table)
                        .col(ScheduleEntries::InstallerId)
                        .col(ScheduleEntries::Date)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ScheduleEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ScheduleEntries {
        Table,
        Id,
        InstallerId,
        OrderNumber,
        Date,
        TimeSlot,
        Notes,
        Completed,
        CreatedAt,
        UpdatedAt,
    }
}

/// Connection tuned for schema changes: small pool, long timeouts.
pub async fn connect(db_url: &str) -> Result<DatabaseConnection> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(4)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    Ok(Database::connect(opt).await?)
}

// Database migration CLI runner
pub async fn run_migration(db_url: &str) -> Result<()> {
    let db = connect(db_url).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
