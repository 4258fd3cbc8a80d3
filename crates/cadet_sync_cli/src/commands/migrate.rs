use cadet_sync::db;
use cadet_sync::migration::{Migrator, MigratorTrait};

use super::shared::{CliResult, print_ok};
use crate::MigrateAction;

pub(crate) async fn handle_migrate(action: MigrateAction, database_url: &str) -> CliResult {
    let db = db::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            let pending = Migrator::get_pending_migrations(&db).await?.len();
            Migrator::up(&db, None).await?;
            print_ok(format!("applied {pending} pending migrations"));
        }
        MigrateAction::Down => {
            Migrator::down(&db, Some(1)).await?;
            print_ok("rolled back the last migration");
        }
        MigrateAction::Status => {
            Migrator::status(&db).await?;
            let applied = Migrator::get_applied_migrations(&db).await?.len();
            let pending = Migrator::get_pending_migrations(&db).await?.len();
            print_ok(format!("{applied} applied, {pending} pending"));
        }
        MigrateAction::Fresh => {
            Migrator::fresh(&db).await?;
            print_ok("dropped all tables and reapplied every migration");
        }
    }

    Ok(())
}
