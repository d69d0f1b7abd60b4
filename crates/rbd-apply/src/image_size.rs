use crate::error::ApplyError;

/// The image size declared by an `s` record, if any.
///
/// Set at most once. While unset, bounds checks are skipped: streams
/// without a size record are applied best-effort.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageSize(Option<u64>);

impl ImageSize {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn get(self) -> Option<u64> {
        self.0
    }

    /// Record the declared size.
    ///
    /// # Errors
    ///
    /// [`ApplyError::SizeRedeclared`] if a size was already set.
    pub fn set(&mut self, size: u64) -> Result<(), ApplyError> {
        if let Some(current) = self.0 {
            return Err(ApplyError::SizeRedeclared {
                current,
                requested: size,
            });
        }
        self.0 = Some(size);
        Ok(())
    }

    /// Check that `[offset, offset + length)` fits inside the image.
    ///
    /// # Errors
    ///
    /// [`ApplyError::OutOfBounds`] when a size is known and the range ends
    /// past it (an overflowing end counts as past it).
    pub fn check_bounds(self, offset: u64, length: u64) -> Result<(), ApplyError> {
        let Some(image_size) = self.0 else {
            return Ok(());
        };

        match offset.checked_add(length) {
            Some(end) if end <= image_size => Ok(()),
            _ => Err(ApplyError::OutOfBounds {
                offset,
                length,
                image_size,
            }),
        }
    }
}
