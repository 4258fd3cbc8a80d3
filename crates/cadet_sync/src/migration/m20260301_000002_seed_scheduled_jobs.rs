//! Seed the two recurring jobs: weekly point redistribution and the daily
//! profile sync.
//!
//! Fixed UUIDs keep the seed idempotent across installations.

use sea_orm_migration::prelude::*;
use uuid::Uuid;

#[derive(DeriveMigrationName)]
pub struct Migration;

struct SeedJob {
    id: &'static str,
    name: &'static str,
    cron: &'static str,
    task: &'static str,
    kwargs: fn() -> serde_json::Value,
}

const SEED_JOBS: &[SeedJob] = &[
    SeedJob {
        id: "3c1e0f52-7a4b-4d8e-9b21-5f6a7c8d9e01",
        name: "redistribute-points",
        // Mondays at 07:42.
        cron: "0 42 7 * * Mon",
        task: "redistribute-points",
        kwargs: redistribution_kwargs,
    },
    SeedJob {
        id: "3c1e0f52-7a4b-4d8e-9b21-5f6a7c8d9e02",
        name: "sync-profiles",
        // Every day at 10:00.
        cron: "0 0 10 * * *",
        task: "sync-profiles",
        kwargs: empty_kwargs,
    },
];

fn redistribution_kwargs() -> serde_json::Value {
    serde_json::json!({"target": 10, "dry_run": false})
}

fn empty_kwargs() -> serde_json::Value {
    serde_json::json!({})
}

fn seed_id(job: &SeedJob) -> Result<Uuid, DbErr> {
    Uuid::parse_str(job.id).map_err(|e| DbErr::Custom(format!("seed id {}: {e}", job.name)))
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for job in SEED_JOBS {
            let insert = Query::insert()
                .into_table(ScheduledJobs::Table)
                .columns([
                    ScheduledJobs::Id,
                    ScheduledJobs::Name,
                    ScheduledJobs::Cron,
                    ScheduledJobs::Task,
                    ScheduledJobs::Kwargs,
                    ScheduledJobs::Enabled,
                ])
                .values_panic([
                    seed_id(job)?.into(),
                    job.name.into(),
                    job.cron.into(),
                    job.task.into(),
                    (job.kwargs)().into(),
                    true.into(),
                ])
                .on_conflict(OnConflict::column(ScheduledJobs::Name).do_nothing().to_owned())
                .to_owned();

            manager.exec_stmt(insert).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for job in SEED_JOBS {
            let delete = Query::delete()
                .from_table(ScheduledJobs::Table)
                .and_where(Expr::col(ScheduledJobs::Id).eq(seed_id(job)?))
                .to_owned();
            manager.exec_stmt(delete).await?;
        }

        Ok(())
    }
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
}
