//! Static site generator for protodoc.
//!
//! Turns a resolved [`protodoc_model::Module`] into JSON reference documents,
//! a navigation tree merged with authored pages, and a bundle of static
//! application resources.

pub mod assets;
pub mod builder;
pub mod output;
pub mod pages;
pub mod reference;
pub mod stage;
pub mod tree;

pub use assets::{
    AssetPipeline, FsResourceProvider, MemoryResourceProvider, ResourceBundle, ResourceError,
    ResourceManifest, ResourceProvider,
};
pub use builder::{BuildConfig, BuildError, BuildResult, SiteBuilder};
pub use output::OutputDir;
pub use stage::{BuildContext, Stage, StageReport};
pub use tree::{NodeKind, PageTree};
