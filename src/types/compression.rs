use num_enum::{FromPrimitive, IntoPrimitive};

/// Available compression algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.3>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, derive_more::Display)]
#[repr(u8)]
#[non_exhaustive]
pub enum CompressionAlgorithm {
    #[display("uncompressed")]
    Uncompressed = 0,
    #[display("zip")]
    ZIP = 1,
    #[display("zlib")]
    ZLIB = 2,
    #[display("bzip2")]
    BZip2 = 3,

    #[num_enum(catch_all)]
    #[display("unknown({_0})")]
    Other(u8),
}
