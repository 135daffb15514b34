//! Fixed-size chunk walking with result accumulation

use tracing::warn;

/// One slice of the input
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    /// Index of the first item within the whole input
    pub start_index: usize,
    pub items: Vec<T>,
}

impl<T> Chunk<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Walks an input array chunk by chunk and collects per-chunk results
#[derive(Debug, Clone)]
pub struct ChunkCursor<T, R = T> {
    items: Vec<T>,
    chunk_size: usize,
    position: usize,
    results: Vec<R>,
}

impl<T: Clone, R> ChunkCursor<T, R> {
    /// Chunk sizes below 1 become 1
    pub fn new(items: Vec<T>, chunk_size: i64) -> Self {
        let chunk_size = if chunk_size < 1 {
            warn!(chunk_size, "Chunk size below 1, using 1");
            1
        } else {
            usize::try_from(chunk_size).unwrap_or(usize::MAX)
        };

        Self {
            results: Vec::with_capacity(items.len()),
            items,
            chunk_size,
            position: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn array_len(&self) -> usize {
        self.items.len()
    }

    /// Index of the next item to hand out
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.items.len()
    }

    pub fn next_chunk(&mut self) -> Option<Chunk<T>> {
        if self.is_exhausted() {
            return None;
        }

        let start_index = self.position;
        let end = start_index.saturating_add(self.chunk_size).min(self.items.len());
        self.position = end;

        Some(Chunk {
            start_index,
            items: self.items[start_index..end].to_vec(),
        })
    }

    /// Append the results of a processed chunk
    pub fn accumulate(&mut self, results: impl IntoIterator<Item = R>) {
        self.results.extend(results);
    }

    pub fn results(&self) -> &[R] {
        &self.results
    }

    /// Accumulated results, once every chunk has been handed out
    pub fn finish(self) -> Option<Vec<R>> {
        if self.is_exhausted() {
            Some(self.results)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walks_in_chunks() {
        let mut cursor: ChunkCursor<i32> = ChunkCursor::new(vec![1, 2, 3, 4, 5], 2);
        assert_eq!(cursor.array_len(), 5);

        let mut starts = Vec::new();
        while let Some(chunk) = cursor.next_chunk() {
            starts.push(chunk.start_index);
            cursor.accumulate(chunk.items.iter().map(|n| n * 10));
        }

        assert_eq!(starts, vec![0, 2, 4]);
        assert_eq!(cursor.finish(), Some(vec![10, 20, 30, 40, 50]));
    }

    #[test]
    fn test_finish_before_exhausted() {
        let mut cursor: ChunkCursor<i32> = ChunkCursor::new(vec![1, 2, 3], 2);
        let first = cursor.next_chunk().unwrap();
        assert_eq!(first.items, vec![1, 2]);
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.finish(), None);
    }

    #[test]
    fn test_non_positive_chunk_size() {
        let cursor: ChunkCursor<i32> = ChunkCursor::new(vec![1, 2], 0);
        assert_eq!(cursor.chunk_size(), 1);
        let cursor: ChunkCursor<i32> = ChunkCursor::new(vec![1, 2], -4);
        assert_eq!(cursor.chunk_size(), 1);
    }

    #[test]
    fn test_empty_input() {
        let mut cursor: ChunkCursor<i32, String> = ChunkCursor::new(Vec::new(), 3);
        assert!(cursor.next_chunk().is_none());
        assert_eq!(cursor.finish(), Some(Vec::new()));
    }

    #[test]
    fn test_oversized_chunk() {
        let mut cursor: ChunkCursor<i32> = ChunkCursor::new(vec![1, 2, 3], 50);
        let chunk = cursor.next_chunk().unwrap();
        assert_eq!(chunk.len(), 3);
        assert!(cursor.next_chunk().is_none());
    }
}
