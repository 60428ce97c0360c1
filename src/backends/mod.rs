//! Concrete backend implementations (`spec.md` §6): the OS directory
//! backend every [`VirtualFs`](crate::VirtualFs) is built on, the two
//! built-in archive formats, and the sub-filesystem reprojection backend.

pub mod native;
pub mod pak;
pub mod sub;
pub mod zip;

pub use native::NativeBackend;
pub use pak::PakFactory;
pub use sub::SubBackend;
pub use zip::ZipFactory;
