use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OffsetLookupError {
    #[error("offset {0} does not land on a token boundary")]
    NotOnBoundary(usize),
    #[error("offset {0} precedes the first token")]
    OutOfRange(usize),
}

/// Ordered index over the byte offsets at which host tokens start, relative
/// to the start of the raw assembly text. This is the translation layer
/// between the two coordinate systems in play: the host's token stream and
/// the sub-parser's private buffer offsets. Two lookups, nothing fuzzier:
/// `exact` for offsets that must be a token boundary, `floor` for offsets
/// that may land anywhere inside a token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenOffsetIndex {
    offsets: Vec<usize>,
}

impl TokenOffsetIndex {
    /// `offsets` must be strictly increasing, one entry per token.
    pub fn new(offsets: Vec<usize>) -> Self {
        debug_assert!(
            offsets.windows(2).all(|pair| pair[0] < pair[1]),
            "token offsets must be strictly increasing"
        );
        Self { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Start offset of the token at `index`.
    pub fn start_of(&self, index: usize) -> usize {
        self.offsets[index]
    }

    /// Index of the token starting exactly at `offset`.
    pub fn exact(&self, offset: usize) -> Result<usize, OffsetLookupError> {
        self.offsets
            .binary_search(&offset)
            .map_err(|_| OffsetLookupError::NotOnBoundary(offset))
    }

    /// Index of the token with the greatest start offset `<= offset`.
    pub fn floor(&self, offset: usize) -> Result<usize, OffsetLookupError> {
        let after = self.offsets.partition_point(|start| *start <= offset);
        if after == 0 {
            return Err(OffsetLookupError::OutOfRange(offset));
        }
        Ok(after - 1)
    }
}
