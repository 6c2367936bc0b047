use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_directory_tables::Migration),
            Box::new(m20250301_000002_create_catalog_tables::Migration),
            Box::new(m20250301_000003_create_bookings_table::Migration),
            Box::new(m20250301_000004_create_vendor_notifications_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250301_000001_create_directory_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_directory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Profiles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Profiles::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Profiles::FullName).string().not_null())
                        .col(ColumnDef::new(Profiles::Email).string().null())
                        .col(ColumnDef::new(Profiles::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Vendors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vendors::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Vendors::LegalName).string().not_null())
                        .col(ColumnDef::new(Vendors::Address).text().not_null())
                        .col(ColumnDef::new(Vendors::Siret).string().not_null())
                        .col(ColumnDef::new(Vendors::VatNumber).string().null())
                        .col(ColumnDef::new(Vendors::ContactEmail).string().null())
                        .col(
                            ColumnDef::new(Vendors::BookingEmailsEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Vendors::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Vendors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Profiles::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Profiles {
        Table,
        Id,
        FullName,
        Email,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Vendors {
        Table,
        Id,
        LegalName,
        Address,
        Siret,
        VatNumber,
        ContactEmail,
        BookingEmailsEnabled,
        CreatedAt,
    }
}

mod m20250301_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Offers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Offers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Offers::VendorId).uuid().not_null())
                        .col(ColumnDef::new(Offers::Title).string().not_null())
                        .col(
                            ColumnDef::new(Offers::Modality)
                                .string()
                                .not_null()
                                .default("in_person"),
                        )
                        .col(ColumnDef::new(Offers::EventStart).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Offers::ConnectionLink).string().null())
                        .col(ColumnDef::new(Offers::SchedulingLink).string().null())
                        .col(ColumnDef::new(Offers::ListPrice).decimal().null())
                        .col(ColumnDef::new(Offers::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OfferVariants::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OfferVariants::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OfferVariants::OfferId).uuid().not_null())
                        .col(ColumnDef::new(OfferVariants::Name).string().not_null())
                        .col(ColumnDef::new(OfferVariants::Price).decimal().null())
                        .col(
                            ColumnDef::new(OfferVariants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_offer_variants_offer_id")
                        .table(OfferVariants::Table)
                        .col(OfferVariants::OfferId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OfferVariants::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Offers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Offers {
        Table,
        Id,
        VendorId,
        Title,
        Modality,
        EventStart,
        ConnectionLink,
        SchedulingLink,
        ListPrice,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OfferVariants {
        Table,
        Id,
        OfferId,
        Name,
        Price,
        CreatedAt,
    }
}

mod m20250301_000003_create_bookings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_bookings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Bookings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Bookings::BuyerId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::OfferId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::VariantId).uuid().null())
                        .col(ColumnDef::new(Bookings::VendorId).uuid().not_null())
                        // The dedup backbone: one booking per upstream payment
                        // reference, enforced by the storage layer.
                        .col(
                            ColumnDef::new(Bookings::IdempotencyKey)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Bookings::Amount).decimal().null())
                        .col(
                            ColumnDef::new(Bookings::Currency)
                                .string()
                                .not_null()
                                .default("EUR"),
                        )
                        .col(
                            ColumnDef::new(Bookings::Status)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Bookings::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Bookings::ScheduledAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Bookings::MeetingLocation).text().null())
                        .col(ColumnDef::new(Bookings::CancelledBy).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_bookings_buyer_id")
                        .table(Bookings::Table)
                        .col(Bookings::BuyerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_bookings_vendor_id")
                        .table(Bookings::Table)
                        .col(Bookings::VendorId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Bookings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Bookings {
        Table,
        Id,
        BuyerId,
        OfferId,
        VariantId,
        VendorId,
        IdempotencyKey,
        Amount,
        Currency,
        Status,
        CreatedAt,
        ScheduledAt,
        MeetingLocation,
        CancelledBy,
    }
}

mod m20250301_000004_create_vendor_notifications_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_vendor_notifications_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(VendorNotifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(VendorNotifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(VendorNotifications::VendorId).uuid().not_null())
                        .col(ColumnDef::new(VendorNotifications::Kind).string().not_null())
                        .col(ColumnDef::new(VendorNotifications::Title).string().not_null())
                        .col(ColumnDef::new(VendorNotifications::Body).text().not_null())
                        .col(
                            ColumnDef::new(VendorNotifications::Read)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(VendorNotifications::Payload).json().not_null())
                        .col(
                            ColumnDef::new(VendorNotifications::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_vendor_notifications_vendor_id")
                        .table(VendorNotifications::Table)
                        .col(VendorNotifications::VendorId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(VendorNotifications::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum VendorNotifications {
        Table,
        Id,
        VendorId,
        Kind,
        Title,
        Body,
        Read,
        Payload,
        CreatedAt,
    }
}
