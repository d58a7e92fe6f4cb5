use ffmpeg_the_third as ffmpeg;
use std::fmt;

use super::to_ff;
use crate::container::Packet;
use crate::types::Rational;

/// A packet read from a [`super::NativeInput`].
pub struct NativePacket {
    inner: ffmpeg::Packet,
}

impl NativePacket {
    pub(crate) fn new(inner: ffmpeg::Packet) -> Self {
        Self { inner }
    }

    pub(crate) fn inner_mut(&mut self) -> &mut ffmpeg::Packet {
        &mut self.inner
    }
}

impl fmt::Debug for NativePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativePacket")
            .field("stream", &self.inner.stream())
            .field("pts", &self.inner.pts())
            .field("dts", &self.inner.dts())
            .field("duration", &self.inner.duration())
            .finish()
    }
}

impl Packet for NativePacket {
    fn stream_index(&self) -> usize {
        self.inner.stream()
    }

    fn set_stream_index(&mut self, index: usize) {
        self.inner.set_stream(index);
    }

    fn pts(&self) -> Option<i64> {
        self.inner.pts()
    }

    fn dts(&self) -> Option<i64> {
        self.inner.dts()
    }

    fn duration(&self) -> i64 {
        self.inner.duration()
    }

    fn rescale_ts(&mut self, from: Rational, to: Rational) {
        self.inner.rescale_ts(to_ff(from), to_ff(to));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_keeps_unset_timestamps_unset() {
        let mut packet = NativePacket::new(ffmpeg::Packet::empty());
        packet.set_stream_index(2);
        packet.inner_mut().set_pts(Some(1000));
        packet.inner_mut().set_duration(40);

        packet.rescale_ts(Rational::new(1, 1000), Rational::new(1, 90_000));

        assert_eq!(packet.stream_index(), 2);
        assert_eq!(packet.pts(), Some(90_000));
        assert_eq!(packet.dts(), None);
        assert_eq!(packet.duration(), 3600);
    }
}
