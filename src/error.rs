use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ActorState, EntityId, EntityTag, LightPhase};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum QuestionSourceError {
    #[error("failed to read question source {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("question source is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("question source has no usable questions")]
    Empty,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),
    #[error("entity {id} is a {tag:?} and has no such state machine")]
    WrongKind { id: EntityId, tag: EntityTag },
    #[error("actor {id} is in terminal state {from:?}, refusing {to:?}")]
    Terminal {
        id: EntityId,
        from: ActorState,
        to: ActorState,
    },
    #[error("doll {id} is in {from:?} for the rest of the round, refusing {to:?}")]
    Sink {
        id: EntityId,
        from: LightPhase,
        to: LightPhase,
    },
}
