//! Single-slot mailbox between the pipeline worker and pose consumers.
//!
//! The worker overwrites the slot after every successful frame; readers take
//! the latest value. Poses written between two reads are dropped.

use parking_lot::Mutex;

use crate::camera::Frame;
use crate::geometry::SE3;

/// Result of polling the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// A pose was written since the last read.
    Fresh,
    /// Nothing new. The accompanying pose is stale and must not be relied on.
    NoNewData,
}

/// Opaque handle of the surface the rendering client draws into
/// (e.g. a texture id). Stored and handed back, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderTarget(pub usize);

#[derive(Debug, Default)]
struct SinkSlot {
    pose: SE3,
    frame: Option<Frame>,
    fresh: bool,
}

/// Latest (pose, frame) pair.
///
/// `set` and `try_update` lock the same mutex, so a reader always sees a
/// complete pose.
#[derive(Debug, Default)]
pub struct PoseSink {
    slot: Mutex<SinkSlot>,
    render_target: Mutex<Option<RenderTarget>>,
}

impl PoseSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot and mark it fresh.
    pub fn set(&self, pose: SE3, frame: Frame) {
        let mut slot = self.slot.lock();
        slot.pose = pose;
        slot.frame = Some(frame);
        slot.fresh = true;
    }

    /// Take the latest pose without blocking on the producer beyond the
    /// slot lock. Returns the last stored pose (identity before the first
    /// write) alongside `NoNewData`.
    pub fn try_update(&self) -> (SinkStatus, SE3) {
        let mut slot = self.slot.lock();
        if slot.fresh {
            slot.fresh = false;
            (SinkStatus::Fresh, slot.pose)
        } else {
            (SinkStatus::NoNewData, slot.pose)
        }
    }

    /// Frame the latest pose was computed on.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.slot.lock().frame.clone()
    }

    pub fn bind_render_target(&self, target: RenderTarget) {
        *self.render_target.lock() = Some(target);
    }

    pub fn render_target(&self) -> Option<RenderTarget> {
        *self.render_target.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::RgbImage;
    use nalgebra::{Matrix3, Vector3};
    use std::sync::Arc;
    use std::thread;

    fn pose_at(z: f64) -> SE3 {
        SE3::from_rt(Matrix3::identity(), Vector3::new(z, 2.0 * z, 3.0 * z))
    }

    fn frame(index: u64) -> Frame {
        Frame::new(index, RgbImage::new(2, 2))
    }

    #[test]
    fn test_empty_sink_reports_no_new_data() {
        let sink = PoseSink::new();
        let (status, pose) = sink.try_update();
        assert_eq!(status, SinkStatus::NoNewData);
        assert_relative_eq!(pose.translation, Vector3::zeros());
        assert!(sink.latest_frame().is_none());
    }

    #[test]
    fn test_last_write_wins_and_read_clears_freshness() {
        let sink = PoseSink::new();
        for i in 1..=3 {
            sink.set(pose_at(i as f64), frame(i));
        }
        let (status, pose) = sink.try_update();
        assert_eq!(status, SinkStatus::Fresh);
        assert_relative_eq!(pose.translation.x, 3.0);
        assert_eq!(sink.latest_frame().map(|f| f.index), Some(3));

        let (status, _) = sink.try_update();
        assert_eq!(status, SinkStatus::NoNewData);
    }

    #[test]
    fn test_render_target_is_stored() {
        let sink = PoseSink::new();
        assert_eq!(sink.render_target(), None);
        sink.bind_render_target(RenderTarget(42));
        assert_eq!(sink.render_target(), Some(RenderTarget(42)));
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_pose() {
        let sink = Arc::new(PoseSink::new());
        let writer = {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                for i in 0..2000u64 {
                    sink.set(pose_at(i as f64), frame(i));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let (_, pose) = sink.try_update();
                        let t = pose.translation;
                        assert_relative_eq!(t.y, 2.0 * t.x);
                        assert_relative_eq!(t.z, 3.0 * t.x);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
