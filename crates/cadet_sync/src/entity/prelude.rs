//! Common re-exports for convenient entity usage.

pub use super::profile_snapshot::{
    ActiveModel as ProfileSnapshotActiveModel, Column as ProfileSnapshotColumn,
    Entity as ProfileSnapshot, Model as ProfileSnapshotModel,
};
pub use super::profile_summary::{
    ActiveModel as ProfileSummaryActiveModel, Column as ProfileSummaryColumn,
    Entity as ProfileSummary, Model as ProfileSummaryModel,
};
pub use super::scheduled_job::{
    ActiveModel as ScheduledJobActiveModel, Column as ScheduledJobColumn, Entity as ScheduledJob,
    Model as ScheduledJobModel,
};
pub use super::webhook_target::{
    ActiveModel as WebhookTargetActiveModel, Column as WebhookTargetColumn,
    Entity as WebhookTarget, Model as WebhookTargetModel,
};
