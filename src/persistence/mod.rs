//! On-disk persistence of fusion configuration and learned state.

mod blob;

pub use blob::{
    read_config_file, strip_legacy_header, BlobStore, PersistenceError, LEGACY_HEADER_LEN,
};
