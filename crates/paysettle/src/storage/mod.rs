pub mod filesystem;

pub use filesystem::{payment_file_key, BlobStore, FilesystemBlobStore};
