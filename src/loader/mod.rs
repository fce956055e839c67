//! Tool discovery, loading and invocation.

pub mod plugin;
pub mod registry;

pub use plugin::{HandlerRegistry, LoadedPlugin, PluginManifest, ToolHandler};
pub use registry::{
    LoadEvent, LoadEventKind, LoaderState, ToolInfo, ToolLoader, ToolRecord, ToolStatus,
    ToolVersion, DEFAULT_LOG_LIMIT,
};
