use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_technicians_table::Migration),
            Box::new(m20240601_000002_create_bookings_table::Migration),
            Box::new(m20240601_000003_create_work_orders_table::Migration),
            Box::new(m20240601_000004_create_quotes_table::Migration),
            Box::new(m20240601_000005_create_work_order_parts_table::Migration),
            Box::new(m20240601_000006_create_work_order_activity_logs_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240601_000001_create_technicians_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_technicians_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Technicians::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Technicians::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Technicians::Name).string().not_null())
                        .col(ColumnDef::new(Technicians::Specialty).string().null())
                        .col(
                            ColumnDef::new(Technicians::HourlyRate)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Technicians::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Technicians::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Technicians::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Technicians::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Technicians {
        Table,
        Id,
        Name,
        Specialty,
        HourlyRate,
        IsAvailable,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_bookings_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_bookings_table"
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
                        .col(ColumnDef::new(Bookings::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::ContactName).string().not_null())
                        .col(ColumnDef::new(Bookings::ContactPhone).string().not_null())
                        .col(ColumnDef::new(Bookings::ContactEmail).string().null())
                        .col(ColumnDef::new(Bookings::ServiceType).string_len(16).not_null())
                        .col(ColumnDef::new(Bookings::DeviceModel).string().not_null())
                        .col(ColumnDef::new(Bookings::SerialNumber).string().null())
                        .col(ColumnDef::new(Bookings::IssueDescription).text().not_null())
                        .col(ColumnDef::new(Bookings::ImageUrls).json().not_null())
                        .col(ColumnDef::new(Bookings::VideoUrls).json().not_null())
                        .col(ColumnDef::new(Bookings::PreferredDate).date().not_null())
                        .col(ColumnDef::new(Bookings::PreferredTimeSlot).string().not_null())
                        .col(ColumnDef::new(Bookings::ServiceAddress).string().null())
                        .col(ColumnDef::new(Bookings::LocationType).string_len(16).null())
                        .col(ColumnDef::new(Bookings::OnSiteNotes).text().null())
                        .col(
                            ColumnDef::new(Bookings::OnSiteFee)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Bookings::TermsAccepted).boolean().not_null())
                        .col(
                            ColumnDef::new(Bookings::TermsAcceptedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Bookings::OrganizationId).uuid().null())
                        .col(ColumnDef::new(Bookings::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Bookings::RejectionReason).string().null())
                        .col(ColumnDef::new(Bookings::WorkOrderId).uuid().null())
                        .col(
                            ColumnDef::new(Bookings::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::RejectedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::ConvertedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_customer_id")
                        .table(Bookings::Table)
                        .col(Bookings::CustomerId)
                        .to_owned(),
                )
                .await?;

            // A booking converts into at most one work order.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_work_order_id")
                        .table(Bookings::Table)
                        .col(Bookings::WorkOrderId)
                        .unique()
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
    pub(super) enum Bookings {
        Table,
        Id,
        CustomerId,
        ContactName,
        ContactPhone,
        ContactEmail,
        ServiceType,
        DeviceModel,
        SerialNumber,
        IssueDescription,
        ImageUrls,
        VideoUrls,
        PreferredDate,
        PreferredTimeSlot,
        ServiceAddress,
        LocationType,
        OnSiteNotes,
        OnSiteFee,
        TermsAccepted,
        TermsAcceptedAt,
        OrganizationId,
        Status,
        RejectionReason,
        WorkOrderId,
        ApprovedAt,
        RejectedAt,
        ConvertedAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240601_000003_create_work_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_work_orders_table"
        }
    }

    fn money(col: WorkOrders) -> ColumnDef {
        ColumnDef::new(col)
            .decimal_len(16, 4)
            .not_null()
            .default(0)
            .to_owned()
    }

    fn stamp(col: WorkOrders) -> ColumnDef {
        ColumnDef::new(col).timestamp_with_time_zone().null().to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkOrders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(WorkOrders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(WorkOrders::TicketNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(WorkOrders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(WorkOrders::BookingId).uuid().null())
                        .col(ColumnDef::new(WorkOrders::DeviceModel).string().not_null())
                        .col(ColumnDef::new(WorkOrders::SerialNumber).string().null())
                        .col(ColumnDef::new(WorkOrders::IssueDescription).string().not_null())
                        .col(ColumnDef::new(WorkOrders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(WorkOrders::TechnicianId).uuid().null())
                        .col(ColumnDef::new(WorkOrders::ServiceType).string_len(16).not_null())
                        .col(ColumnDef::new(WorkOrders::ServiceAddress).string().null())
                        .col(ColumnDef::new(WorkOrders::LocationType).string_len(16).null())
                        .col(&mut money(WorkOrders::PartsCost))
                        .col(&mut money(WorkOrders::LaborCost))
                        .col(&mut money(WorkOrders::ServiceFee))
                        .col(&mut money(WorkOrders::TotalCost))
                        .col(ColumnDef::new(WorkOrders::TechnicalNotes).text().null())
                        .col(ColumnDef::new(WorkOrders::HoldReason).string().null())
                        .col(ColumnDef::new(WorkOrders::DeclineReason).string().null())
                        .col(ColumnDef::new(WorkOrders::CancellationReason).string().null())
                        .col(ColumnDef::new(WorkOrders::CompletionNotes).text().null())
                        .col(ColumnDef::new(WorkOrders::CurrentQuoteId).uuid().null())
                        .col(&mut stamp(WorkOrders::AssignedAt))
                        .col(&mut stamp(WorkOrders::AssignmentAcceptedAt))
                        .col(&mut stamp(WorkOrders::DiagnosedAt))
                        .col(&mut stamp(WorkOrders::QuotedAt))
                        .col(&mut stamp(WorkOrders::ApprovedAt))
                        .col(&mut stamp(WorkOrders::StartedAt))
                        .col(&mut stamp(WorkOrders::FinishedAt))
                        .col(&mut stamp(WorkOrders::CancelledAt))
                        .col(
                            ColumnDef::new(WorkOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_customer_id")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_technician_id")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::TechnicianId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_status")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WorkOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone, Copy)]
    pub(super) enum WorkOrders {
        Table,
        Id,
        TicketNumber,
        CustomerId,
        BookingId,
        DeviceModel,
        SerialNumber,
        IssueDescription,
        Status,
        TechnicianId,
        ServiceType,
        ServiceAddress,
        LocationType,
        PartsCost,
        LaborCost,
        ServiceFee,
        TotalCost,
        TechnicalNotes,
        HoldReason,
        DeclineReason,
        CancellationReason,
        CompletionNotes,
        CurrentQuoteId,
        AssignedAt,
        AssignmentAcceptedAt,
        DiagnosedAt,
        QuotedAt,
        ApprovedAt,
        StartedAt,
        FinishedAt,
        CancelledAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240601_000004_create_quotes_table {

    use super::m20240601_000003_create_work_orders_table::WorkOrders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_quotes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Quotes::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Quotes::QuoteNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Quotes::WorkOrderId).uuid().not_null())
                        .col(ColumnDef::new(Quotes::PartsCost).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Quotes::LaborCost).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Quotes::ServiceFee).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Quotes::TotalCost).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Quotes::EstimatedHours).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Quotes::HourlyRate).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Quotes::Description).text().null())
                        .col(ColumnDef::new(Quotes::Notes).text().null())
                        .col(ColumnDef::new(Quotes::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Quotes::ValidUntil)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Quotes::ApprovedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Quotes::RejectedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Quotes::RejectionReason).string().null())
                        .col(ColumnDef::new(Quotes::SupersededBy).uuid().null())
                        .col(ColumnDef::new(Quotes::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Quotes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Quotes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Quotes::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quotes_work_order")
                                .from(Quotes::Table, Quotes::WorkOrderId)
                                .to(WorkOrders::Table, WorkOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotes_work_order_id")
                        .table(Quotes::Table)
                        .col(Quotes::WorkOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Quotes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Quotes {
        Table,
        Id,
        QuoteNumber,
        WorkOrderId,
        PartsCost,
        LaborCost,
        ServiceFee,
        TotalCost,
        EstimatedHours,
        HourlyRate,
        Description,
        Notes,
        Status,
        ValidUntil,
        ApprovedAt,
        RejectedAt,
        RejectionReason,
        SupersededBy,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240601_000005_create_work_order_parts_table {

    use super::m20240601_000003_create_work_orders_table::WorkOrders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_work_order_parts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkOrderParts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkOrderParts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WorkOrderParts::WorkOrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(WorkOrderParts::InventoryItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WorkOrderParts::Name).string().not_null())
                        .col(ColumnDef::new(WorkOrderParts::PartNumber).string().null())
                        .col(ColumnDef::new(WorkOrderParts::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(WorkOrderParts::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderParts::LineTotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(WorkOrderParts::AddedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(WorkOrderParts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_work_order_parts_work_order")
                                .from(WorkOrderParts::Table, WorkOrderParts::WorkOrderId)
                                .to(WorkOrders::Table, WorkOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_order_parts_work_order_id")
                        .table(WorkOrderParts::Table)
                        .col(WorkOrderParts::WorkOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WorkOrderParts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WorkOrderParts {
        Table,
        Id,
        WorkOrderId,
        InventoryItemId,
        Name,
        PartNumber,
        Quantity,
        UnitPrice,
        LineTotal,
        AddedBy,
        CreatedAt,
    }
}

mod m20240601_000006_create_work_order_activity_logs_table {

    use super::m20240601_000003_create_work_orders_table::WorkOrders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000006_create_work_order_activity_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkOrderActivityLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkOrderActivityLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderActivityLogs::WorkOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderActivityLogs::Sequence)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderActivityLogs::Kind)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(WorkOrderActivityLogs::Description).text().null())
                        .col(
                            ColumnDef::new(WorkOrderActivityLogs::PreviousStatus)
                                .string_len(32)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderActivityLogs::NewStatus)
                                .string_len(32)
                                .null(),
                        )
                        .col(ColumnDef::new(WorkOrderActivityLogs::ActorId).uuid().not_null())
                        .col(
                            ColumnDef::new(WorkOrderActivityLogs::ActorName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderActivityLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_work_order_activity_logs_work_order")
                                .from(
                                    WorkOrderActivityLogs::Table,
                                    WorkOrderActivityLogs::WorkOrderId,
                                )
                                .to(WorkOrders::Table, WorkOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Two writers racing on the same history collide here.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_order_activity_logs_sequence")
                        .table(WorkOrderActivityLogs::Table)
                        .col(WorkOrderActivityLogs::WorkOrderId)
                        .col(WorkOrderActivityLogs::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WorkOrderActivityLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WorkOrderActivityLogs {
        Table,
        Id,
        WorkOrderId,
        Sequence,
        Kind,
        Description,
        PreviousStatus,
        NewStatus,
        ActorId,
        ActorName,
        CreatedAt,
    }
}
