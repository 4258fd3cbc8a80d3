//! Initial schema: profile summaries and their snapshot history, webhook
//! targets and scheduled jobs.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_profile_summaries(manager).await?;
        self.create_profile_snapshots(manager).await?;
        self.create_webhook_targets(manager).await?;
        self.create_scheduled_jobs(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledJobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WebhookTargets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProfileSnapshots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProfileSummaries::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_profile_summaries(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProfileSummaries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProfileSummaries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProfileSummaries::ExternalId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ProfileSummaries::Login)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ProfileSummaries::PoolMonth).string().null())
                    .col(ColumnDef::new(ProfileSummaries::PoolYear).string().null())
                    .col(
                        ColumnDef::new(ProfileSummaries::TrackIds)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(ProfileSummaries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ProfileSummaries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_profile_snapshots(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProfileSnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProfileSnapshots::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProfileSnapshots::ProfileId).uuid().not_null())
                    .col(
                        ColumnDef::new(ProfileSnapshots::CapturedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProfileSnapshots::Payload).json().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profile_snapshots_profile")
                            .from(ProfileSnapshots::Table, ProfileSnapshots::ProfileId)
                            .to(ProfileSummaries::Table, ProfileSummaries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One snapshot per profile per capture instant; also serves
        // latest-snapshot lookups.
        manager
            .create_index(
                Index::create()
                    .name("idx_profile_snapshots_profile_captured")
                    .table(ProfileSnapshots::Table)
                    .col(ProfileSnapshots::ProfileId)
                    .col(ProfileSnapshots::CapturedAt)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_webhook_targets(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookTargets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookTargets::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WebhookTargets::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(WebhookTargets::Url).text().not_null())
                    .col(
                        ColumnDef::new(WebhookTargets::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(WebhookTargets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_scheduled_jobs(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ScheduledJobs::Cron).string().not_null())
                    .col(ColumnDef::new(ScheduledJobs::Task).string().not_null())
                    .col(
                        ColumnDef::new(ScheduledJobs::Kwargs)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::LastRunAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum ProfileSummaries {
    Table,
    Id,
    ExternalId,
    Login,
    PoolMonth,
    PoolYear,
    TrackIds,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProfileSnapshots {
    Table,
    Id,
    ProfileId,
    CapturedAt,
    Payload,
}

#[derive(DeriveIden)]
enum WebhookTargets {
    Table,
    Id,
    Name,
    Url,
    Description,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ScheduledJobs {
    Table,
    Id,
    Name,
    Cron,
    Task,
    Kwargs,
    Enabled,
    LastRunAt,
}
