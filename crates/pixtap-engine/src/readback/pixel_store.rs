use std::sync::Arc;

use parking_lot::RwLock;

use super::{PixelExtent, ReadbackError};

/// One sampled pixel, straight RGBA8.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a pixel from 1..=4 channel bytes. Missing colour channels read
    /// as 0, a missing alpha as 255.
    fn from_channels(c: &[u8]) -> Self {
        Self {
            r: c.first().copied().unwrap_or(0),
            g: c.get(1).copied().unwrap_or(0),
            b: c.get(2).copied().unwrap_or(0),
            a: c.get(3).copied().unwrap_or(u8::MAX),
        }
    }
}

impl From<Rgba8> for [u8; 4] {
    fn from(p: Rgba8) -> Self {
        [p.r, p.g, p.b, p.a]
    }
}

#[derive(Debug)]
struct Inner {
    bytes: Box<[u8]>,
    frame: Option<u64>,
}

/// Host-resident copy of the most recently completed readback.
///
/// Cloning yields another handle to the same storage. The scheduler is the only
/// writer; any number of consumers may read from any thread. A write replaces
/// the bytes and the frame stamp under one lock, so a reader sees either the
/// old frame or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct PixelStore {
    inner: Arc<RwLock<Inner>>,
    extent: PixelExtent,
}

impl PixelStore {
    /// Creates a zero-filled store for `extent`.
    pub fn new(extent: PixelExtent) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                bytes: vec![0u8; extent.byte_len()].into_boxed_slice(),
                frame: None,
            })),
            extent,
        }
    }

    pub fn extent(&self) -> PixelExtent {
        self.extent
    }

    pub fn capacity(&self) -> usize {
        self.extent.byte_len()
    }

    /// Tick whose render produced the current contents, `None` before the
    /// first publish.
    pub fn frame(&self) -> Option<u64> {
        self.inner.read().frame
    }

    /// Replaces the entire contents with a full frame rendered on tick `frame`.
    ///
    /// Partial payloads are rejected and leave the store untouched.
    pub(crate) fn write(&self, frame: u64, bytes: &[u8]) -> Result<(), ReadbackError> {
        if bytes.len() != self.capacity() {
            return Err(ReadbackError::PayloadSize {
                got: bytes.len(),
                expected: self.capacity(),
            });
        }

        let mut inner = self.inner.write();
        inner.bytes.copy_from_slice(bytes);
        inner.frame = Some(frame);
        Ok(())
    }

    /// Copies `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: usize, len: usize) -> Result<Vec<u8>, ReadbackError> {
        let mut out = vec![0u8; len];
        self.read_into(offset, &mut out)?;
        Ok(out)
    }

    /// Fills `out` with the bytes starting at `offset`.
    pub fn read_into(&self, offset: usize, out: &mut [u8]) -> Result<(), ReadbackError> {
        let range = self.checked_range(offset, out.len())?;
        out.copy_from_slice(&self.inner.read().bytes[range]);
        Ok(())
    }

    /// Samples the pixel at `(x, y)`, origin top-left.
    pub fn sample_pixel(&self, x: u32, y: u32) -> Result<Rgba8, ReadbackError> {
        self.sample_stamped(x, y).map(|(px, _)| px)
    }

    /// Samples `(x, y)` together with the frame stamp of the same contents.
    pub fn sample_stamped(&self, x: u32, y: u32) -> Result<(Rgba8, Option<u64>), ReadbackError> {
        let channels = self.extent.channel_count() as usize;
        let Some(offset) = self.extent.pixel_offset(x, y) else {
            return Err(ReadbackError::OutOfBounds {
                offset: (y as usize)
                    .saturating_mul(self.extent.width() as usize)
                    .saturating_add(x as usize)
                    .saturating_mul(channels),
                len: channels,
                capacity: self.capacity(),
            });
        };

        let inner = self.inner.read();
        let px = &inner.bytes[offset..offset + channels];
        Ok((Rgba8::from_channels(&px[..channels.min(4)]), inner.frame))
    }

    /// Copies the whole store along with its frame stamp.
    pub fn snapshot(&self) -> (Option<u64>, Vec<u8>) {
        let inner = self.inner.read();
        (inner.frame, inner.bytes.to_vec())
    }

    fn checked_range(
        &self,
        offset: usize,
        len: usize,
    ) -> Result<std::ops::Range<usize>, ReadbackError> {
        let capacity = self.capacity();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(offset..end),
            _ => Err(ReadbackError::OutOfBounds { offset, len, capacity }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(w: u32, h: u32) -> PixelStore {
        PixelStore::new(PixelExtent::rgba8(w, h).unwrap())
    }

    fn solid(extent: PixelExtent, px: [u8; 4]) -> Vec<u8> {
        px.iter().copied().cycle().take(extent.byte_len()).collect()
    }

    // ── write ─────────────────────────────────────────────────────────────

    #[test]
    fn starts_zeroed_without_frame() {
        let s = store(2, 2);
        assert_eq!(s.frame(), None);
        assert_eq!(s.read_at(0, 16).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn write_replaces_everything_and_stamps() {
        let s = store(2, 1);
        s.write(7, &solid(s.extent(), [1, 2, 3, 4])).unwrap();
        assert_eq!(s.frame(), Some(7));
        assert_eq!(s.read_at(0, 8).unwrap(), vec![1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn partial_write_is_rejected_and_changes_nothing() {
        let s = store(2, 1);
        s.write(1, &solid(s.extent(), [9, 9, 9, 9])).unwrap();

        let err = s.write(2, &[0u8; 4]).unwrap_err();
        assert_eq!(err, ReadbackError::PayloadSize { got: 4, expected: 8 });
        assert_eq!(s.frame(), Some(1));
        assert_eq!(s.read_at(0, 8).unwrap(), vec![9u8; 8]);
    }

    // ── read_at ───────────────────────────────────────────────────────────

    #[test]
    fn read_at_exact_end_succeeds() {
        let s = store(2, 1);
        assert_eq!(s.read_at(4, 4).unwrap().len(), 4);
        assert_eq!(s.read_at(8, 0).unwrap().len(), 0);
    }

    #[test]
    fn read_at_past_end_fails_without_clamping() {
        let s = store(2, 1);
        assert_eq!(
            s.read_at(5, 4).unwrap_err(),
            ReadbackError::OutOfBounds { offset: 5, len: 4, capacity: 8 }
        );
        assert!(matches!(s.read_at(usize::MAX, 2), Err(ReadbackError::OutOfBounds { .. })));
    }

    // ── sample_pixel ──────────────────────────────────────────────────────

    #[test]
    fn sample_pixel_inside_extent_succeeds_everywhere() {
        let s = store(3, 2);
        let bytes: Vec<u8> = (0..s.capacity() as u8).collect();
        s.write(1, &bytes).unwrap();

        for y in 0..2 {
            for x in 0..3 {
                let base = (4 * (y * 3 + x)) as u8;
                assert_eq!(
                    s.sample_pixel(x, y).unwrap(),
                    Rgba8::new(base, base + 1, base + 2, base + 3)
                );
            }
        }
    }

    #[test]
    fn sample_pixel_outside_extent_is_out_of_bounds() {
        let s = store(3, 2);
        assert!(matches!(s.sample_pixel(3, 0), Err(ReadbackError::OutOfBounds { .. })));
        assert!(matches!(s.sample_pixel(0, 2), Err(ReadbackError::OutOfBounds { .. })));
        assert!(matches!(s.sample_pixel(u32::MAX, u32::MAX), Err(ReadbackError::OutOfBounds { .. })));
    }

    #[test]
    fn sample_pixel_fills_missing_channels() {
        let s = PixelStore::new(PixelExtent::new(1, 1, 2).unwrap());
        s.write(1, &[10, 20]).unwrap();
        assert_eq!(s.sample_pixel(0, 0).unwrap(), Rgba8::new(10, 20, 0, 255));
    }

    // ── concurrency ───────────────────────────────────────────────────────

    #[test]
    fn concurrent_readers_never_see_mixed_frames() {
        let s = store(64, 64);
        let frames: Vec<Vec<u8>> = (1..=50u8).map(|t| vec![t; s.capacity()]).collect();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let reader = s.clone();
                scope.spawn(move || {
                    for _ in 0..500 {
                        let (frame, bytes) = reader.snapshot();
                        let first = bytes[0];
                        assert!(bytes.iter().all(|&b| b == first), "torn read");
                        match frame {
                            None => assert_eq!(first, 0),
                            Some(t) => assert_eq!(first as u64, t),
                        }
                    }
                });
            }

            for (i, f) in frames.iter().enumerate() {
                s.write(i as u64 + 1, f).unwrap();
            }
        });
    }

    #[test]
    fn stamped_samples_pair_colour_with_its_own_frame() {
        let s = store(8, 8);
        let frames: Vec<Vec<u8>> = (1..=200u8).map(|t| vec![t; s.capacity()]).collect();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let reader = s.clone();
                scope.spawn(move || {
                    for i in 0..2000u32 {
                        let (px, frame) = reader.sample_stamped(i % 8, (i / 8) % 8).unwrap();
                        let expected = frame.map_or(0, |t| t as u8);
                        assert_eq!(px, Rgba8::new(expected, expected, expected, expected));
                    }
                });
            }

            for (i, f) in frames.iter().enumerate() {
                s.write(i as u64 + 1, f).unwrap();
            }
        });
    }
}
