//! Entities: file names, frame lists, decoded images and codecs

pub mod codec;
pub mod file_info;
pub mod frame;
pub mod sequence;
pub mod speed;

pub use codec::{Codec, CodecKind, CodecRegistry, SequenceReader};
pub use file_info::{FileInfo, FileType};
pub use frame::{Image, ImageInfo, PixelBuffer, PixelFormat};
pub use sequence::{Compress, Sequence};
pub use speed::Speed;
