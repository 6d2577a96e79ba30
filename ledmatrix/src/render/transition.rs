use super::frame_buffer::PixelBuffer;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionPhase {
    /// Snapshot taken, incoming app not active yet. The snapshot is shown
    /// frozen.
    Pending,
    Sliding,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionStep {
    InProgress,
    Finished,
}

/// Horizontal slide from the outgoing app's last frame to the incoming app's
/// live frames. The snapshot is owned here, so dropping the transition
/// releases it.
#[derive(Debug)]
pub struct SlideTransition {
    incoming_id: String,
    snapshot: PixelBuffer,
    offset: usize,
    speed: usize,
    phase: TransitionPhase,
}

impl SlideTransition {
    pub fn new(
        incoming_id: impl Into<String>,
        snapshot: PixelBuffer,
        speed: usize,
    ) -> Self {
        Self {
            incoming_id: incoming_id.into(),
            snapshot,
            offset: 0,
            speed: speed.max(1),
            phase: TransitionPhase::Pending,
        }
    }

    pub fn incoming_id(&self) -> &str {
        &self.incoming_id
    }

    pub fn snapshot(&self) -> &PixelBuffer {
        &self.snapshot
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn speed(&self) -> usize {
        self.speed
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn start_sliding(&mut self) {
        self.phase = TransitionPhase::Sliding;
    }

    /// Total composite steps for a buffer of `width`: `ceil(width / speed)`.
    pub fn total_steps(&self) -> usize {
        self.snapshot.width().div_ceil(self.speed)
    }

    /// Overwrites `frame` with the frozen snapshot.
    pub fn show_snapshot(&self, frame: &mut PixelBuffer) {
        frame.copy_from(&self.snapshot);
    }

    /// `frame` holds the freshly rendered incoming frame. The snapshot is
    /// drawn shifted left by the current offset and the incoming frame
    /// shifted in from the right by `width - offset`; the incoming frame wins
    /// where both would land. Advances the offset afterwards.
    pub fn composite(&mut self, frame: &mut PixelBuffer) -> TransitionStep {
        let width = frame.width();
        let offset = self.offset.min(width);
        let split = width - offset;

        for y in 0..frame.height() {
            let row = frame.row_mut(y);
            row.copy_within(0..offset, split);
            for (x, cell) in row[..split].iter_mut().enumerate() {
                *cell = self.snapshot.get_pixel((x + offset) as i32, y as i32);
            }
        }

        self.offset += self.speed;

        if self.offset >= width {
            TransitionStep::Finished
        } else {
            TransitionStep::InProgress
        }
    }
}
