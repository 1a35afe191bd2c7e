#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError(i32);

impl AllocError {
    /// Out of memory
    pub const ENOMEM: Self = AllocError(-1i32);

    /// Bad chunk geometry
    pub const ELAYOUT: Self = AllocError(-2i32);

    pub fn to_raw_errno(&self) -> i32 {
        self.0
    }
}

pub type Result<T> = core::result::Result<T, AllocError>;
