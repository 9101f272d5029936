//! Core types - pure abstractions shared across the codebase.

mod route;
mod state;
mod tree;

pub use route::{
    ARTIFACT_EXT, BuildTarget, artifact_file_name, path_to_route, route_to_build_path,
    strip_extension,
};
pub use state::{begin_rebuild, is_rebuilding, is_shutdown, register_server, setup_shutdown_handler};
pub use tree::{Content, FileTree, join_key, split_key};
