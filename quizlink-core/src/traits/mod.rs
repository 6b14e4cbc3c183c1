mod collaborators;

pub use collaborators::{
    EmoteInventory, NullResultSink, QuestionSource, QuestionSourceError, ResultSink,
};
