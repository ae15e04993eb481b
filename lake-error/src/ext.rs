use crate::LakeResult;

/// Extension trait for LakeResult
pub trait ResultExt<T>: private::Sealed {
    /// Flatten a nested [`LakeResult`]. Helper function until <https://github.com/rust-lang/rust/issues/70142> is stabilized.
    fn unnest(self) -> LakeResult<T>;
}

mod private {
    use crate::LakeResult;

    pub trait Sealed {}

    impl<T> Sealed for LakeResult<LakeResult<T>> {}
}

impl<T> ResultExt<T> for LakeResult<LakeResult<T>> {
    fn unnest(self) -> LakeResult<T> {
        match self {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) | Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lake_err;

    #[test]
    fn unnest_keeps_inner_error() {
        let nested: LakeResult<LakeResult<u32>> = Ok(Err(lake_err!(Corruption: "bad")));
        assert!(nested.unnest().unwrap_err().is_corruption());
        let nested: LakeResult<LakeResult<u32>> = Ok(Ok(3));
        assert_eq!(nested.unnest().unwrap(), 3);
    }
}
