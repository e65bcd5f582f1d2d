//! I/O modules for LUT files, archives, remote downloads and RSR tables

pub mod container;
pub mod archive;
pub mod generic;
pub mod lock;
pub mod remote;
pub mod rsr;

pub use archive::{ArchiveDecompressor, ArchiveKind, Decompressor};
pub use generic::GenericLutReader;
pub use lock::CacheLock;
pub use remote::{HttpFetcher, RemoteFetcher};
pub use rsr::{JsonRsrProvider, RsrProvider, StaticRsrProvider};
