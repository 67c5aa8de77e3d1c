//! Configuration management for oppsum.

mod settings;

pub use settings::{
    DiscoverySettings, GeneralSettings, PipelineSettings, Settings, StoreSettings,
    SummarizationSettings, TranscriptionSettings,
};
