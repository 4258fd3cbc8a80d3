pub(crate) mod jobs;
pub(crate) mod meta;
#[cfg(feature = "migrate")]
pub(crate) mod migrate;
pub(crate) mod notify;
pub(crate) mod schedule;
pub(crate) mod shared;
pub(crate) mod status;
pub(crate) mod webhook;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}
