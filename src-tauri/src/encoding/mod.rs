// Streaming MP4 clip encoding using FFmpeg

use ffmpeg_next as ffmpeg;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("ffmpeg: {0}")]
    Ffmpeg(#[from] ffmpeg::Error),
    #[error("H.264 encoder not found (FFmpeg built without an H.264 codec)")]
    EncoderMissing,
    #[error("failed to allocate encoder context")]
    ContextAlloc,
    #[error("failed to open H.264 encoder (FFmpeg error {0})")]
    EncoderOpen(i32),
    #[error("frame buffer is {got} bytes, expected {expected}")]
    BadFrame { got: usize, expected: usize },
}

/// Streams RGBA screen frames into an H.264 MP4 file.
///
/// Frames are converted to YUV420P and written interleaved as they arrive,
/// so memory use stays flat no matter how long a clip runs.
pub struct ClipEncoder {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::video::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    ost_time_base: ffmpeg::Rational,
    src_width: u32,
    src_height: u32,
    fps: u32,
    pts: i64,
}

impl ClipEncoder {
    /// Open the output file and write the MP4 header.
    ///
    /// `src_width`/`src_height` are the dimensions of the incoming RGBA
    /// frames; odd values are rounded down for the YUV420P output.
    pub fn create(
        path: &Path,
        src_width: u32,
        src_height: u32,
        fps: u32,
    ) -> Result<Self, EncodeError> {
        // Safe to call multiple times
        ffmpeg::init()?;

        let dst_width = even(src_width);
        let dst_height = even(src_height);

        let mut octx = ffmpeg::format::output(&path)?;

        let codec =
            ffmpeg::encoder::find(ffmpeg::codec::Id::H264).ok_or(EncodeError::EncoderMissing)?;

        let stream_index = {
            let stream = octx.add_stream(codec)?;
            stream.index()
        };

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        // Configure and open the codec context through the raw API so the
        // x264 preset can be passed as a codec-private option.
        let encoder =
            unsafe { open_h264(codec.as_ptr(), dst_width, dst_height, fps, global_header)? };

        {
            let mut stream = octx.stream_mut(stream_index).unwrap();
            stream.set_parameters(&encoder);
        }

        octx.write_header()?;
        // The muxer may rewrite the stream time base during write_header
        let ost_time_base = octx.stream(stream_index).unwrap().time_base();

        let scaler = ffmpeg::software::scaling::Context::get(
            ffmpeg::format::Pixel::RGBA,
            src_width,
            src_height,
            ffmpeg::format::Pixel::YUV420P,
            dst_width,
            dst_height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            octx,
            encoder,
            scaler,
            stream_index,
            ost_time_base,
            src_width,
            src_height,
            fps,
            pts: 0,
        })
    }

    /// Encode one RGBA frame (tightly packed, `width * height * 4` bytes).
    pub fn write_frame(&mut self, rgba: &[u8]) -> Result<(), EncodeError> {
        let expected = self.src_width as usize * self.src_height as usize * 4;
        if rgba.len() != expected {
            return Err(EncodeError::BadFrame {
                got: rgba.len(),
                expected,
            });
        }

        let mut src = ffmpeg::util::frame::video::Video::new(
            ffmpeg::format::Pixel::RGBA,
            self.src_width,
            self.src_height,
        );

        // Copy line by line, respecting the frame's stride
        let stride = src.stride(0);
        let line = self.src_width as usize * 4;
        let data = src.data_mut(0);
        for y in 0..self.src_height as usize {
            data[y * stride..y * stride + line].copy_from_slice(&rgba[y * line..(y + 1) * line]);
        }

        let mut yuv = ffmpeg::util::frame::video::Video::new(
            ffmpeg::format::Pixel::YUV420P,
            even(self.src_width),
            even(self.src_height),
        );
        self.scaler.run(&src, &mut yuv)?;
        yuv.set_pts(Some(self.pts));
        self.pts += 1;

        self.encoder.send_frame(&yuv)?;
        self.drain()
    }

    fn drain(&mut self) -> Result<(), EncodeError> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(
                ffmpeg::Rational::new(1, self.fps as i32),
                self.ost_time_base,
            );
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    /// Flush the encoder and write the MP4 trailer.
    pub fn finish(mut self) -> Result<(), EncodeError> {
        self.encoder.send_eof()?;
        self.drain()?;
        self.octx.write_trailer()?;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.pts as u64
    }
}

unsafe fn open_h264(
    codec_ptr: *const ffmpeg::ffi::AVCodec,
    width: u32,
    height: u32,
    fps: u32,
    global_header: bool,
) -> Result<ffmpeg::encoder::video::Video, EncodeError> {
    use ffmpeg::ffi;
    use std::ptr;

    let mut codec_context = ffi::avcodec_alloc_context3(codec_ptr);
    if codec_context.is_null() {
        return Err(EncodeError::ContextAlloc);
    }

    (*codec_context).codec_id = ffi::AVCodecID::AV_CODEC_ID_H264;
    (*codec_context).codec_type = ffi::AVMediaType::AVMEDIA_TYPE_VIDEO;
    (*codec_context).width = width as i32;
    (*codec_context).height = height as i32;
    (*codec_context).time_base = ffi::AVRational {
        num: 1,
        den: fps as i32,
    };
    (*codec_context).framerate = ffi::AVRational {
        num: fps as i32,
        den: 1,
    };
    (*codec_context).pix_fmt = ffi::AVPixelFormat::AV_PIX_FMT_YUV420P;
    (*codec_context).bit_rate = 5_000_000; // 5 Mbps
    if global_header {
        (*codec_context).flags |= ffi::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
    }

    let mut opts: *mut ffi::AVDictionary = ptr::null_mut();
    let preset_key = std::ffi::CString::new("preset").unwrap();
    let preset_val = std::ffi::CString::new("veryfast").unwrap();
    ffi::av_dict_set(&mut opts, preset_key.as_ptr(), preset_val.as_ptr(), 0);

    let result = ffi::avcodec_open2(codec_context, codec_ptr, &mut opts);
    ffi::av_dict_free(&mut opts);

    if result < 0 {
        ffi::avcodec_free_context(&mut codec_context as *mut _);
        return Err(EncodeError::EncoderOpen(result));
    }

    ffmpeg::codec::Context::wrap(codec_context, None)
        .encoder()
        .video()
        .map_err(EncodeError::Ffmpeg)
}

// YUV420P subsamples chroma 2x2; dimensions must be even
fn even(value: u32) -> u32 {
    value & !1
}

/// Clip duration implied by a frame count at a fixed rate
pub(crate) fn clip_duration_secs(frames: u64, fps: u32) -> f64 {
    frames as f64 / fps as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_calculation() {
        // 15 frames @ 15 fps = 1 second
        assert_eq!(clip_duration_secs(15, 15), 1.0);

        // 150 frames @ 15 fps = 10 seconds
        assert_eq!(clip_duration_secs(150, 15), 10.0);

        // 45 frames @ 30 fps = 1.5 seconds
        assert_eq!(clip_duration_secs(45, 30), 1.5);
    }

    #[test]
    fn odd_dimensions_round_down() {
        assert_eq!(even(1920), 1920);
        assert_eq!(even(1921), 1920);
        assert_eq!(even(1080), 1080);
        assert_eq!(even(1081), 1080);
    }
}
