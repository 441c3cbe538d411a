use thiserror::Error;

/// Errors surfaced by the statistics engine.
#[derive(Debug, Error)]
pub enum StatsError {
    /// A metric name no calculator knows how to populate. Raised instead of
    /// silently returning zero so that typos in metric names are loud.
    #[error("unsupported stat {name:?} for {node}")]
    UnsupportedStat { node: String, name: String },

    /// An entity referenced by a node key no longer exists in the content
    /// source.
    #[error("unknown {kind} {id}")]
    MissingEntity { kind: &'static str, id: String },

    /// A stats record could not be serialized for persistence.
    #[error("failed to encode stats record for {key}")]
    Encode {
        key: String,
        #[source]
        source: bincode::Error,
    },

    /// Failure from a collaborator (cache store, scheduler, content source).
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl StatsError {
    pub fn missing<I: std::fmt::Display>(kind: &'static str, id: I) -> Self {
        Self::MissingEntity {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
