// src/audio_buffer.rs

/// One host output: `channels` planar channels of `frames` samples each.
#[derive(Debug)]
pub struct AudioBuffer<'a> {
    pub channels: usize,
    pub frames: usize,
    pub data: &'a mut [f32], // planar: ch0[0..frames], ch1[0..frames], ...
}

impl<'a> AudioBuffer<'a> {
    /// Create a new AudioBuffer wrapping existing data.
    #[inline]
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        let frames = if channels == 0 { 0 } else { data.len() / channels };
        Self {
            channels,
            frames,
            data,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.frames;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.frames;
        &mut self.data[start..start + self.frames]
    }

    /// Write the same mono block into every channel.
    ///
    /// Frames past the end of `block` are zeroed.
    #[inline]
    pub fn fill_from_mono(&mut self, block: &[f32]) {
        for ch in 0..self.channels {
            let dst = self.channel_mut(ch);
            let n = dst.len().min(block.len());
            dst[..n].copy_from_slice(&block[..n]);
            dst[n..].fill(0.0);
        }
    }
}
