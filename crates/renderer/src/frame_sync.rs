//! Frame pacing for pre-recorded command buffers.
//!
//! The synchronizer owns [`MAX_FRAMES_IN_FLIGHT`] slots of synchronization
//! objects. Each [`FrameSynchronizer::begin_frame`] / [`FrameSynchronizer::submit`]
//! / [`FrameSynchronizer::present`] sequence runs the per-frame protocol on
//! the current slot:
//!
//! ```text
//! 1. wait + reset in_flight_fence[slot]
//! 2. acquire image         -> signals image_available[slot]
//! 3. (caller updates the uniform buffer of the acquired image)
//! 4. submit cmd[image]     waits image_available[slot] at COLOR_ATTACHMENT_OUTPUT,
//!                          signals render_finished[slot] + in_flight_fence[slot]
//! 5. present image         waits render_finished[slot]
//! 6. advance slot
//! ```
//!
//! The slot only selects the semaphore/fence triple. Command buffers and
//! uniform buffers are selected by the acquired image index.
//!
//! A fence reset in step 1 only signals again once step 4 submits it. If the
//! frame fails in between, [`SlotFences`] remembers that the fence has
//! nothing pending so neither the next frame on that slot nor
//! [`FrameSynchronizer::wait_for_all_frames`] blocks on it forever.

use std::sync::Arc;

use ash::vk;
use mini_vk_rhi::device::Device;
use mini_vk_rhi::swapchain::Swapchain;
use mini_vk_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};
use mini_vk_rhi::RhiResult;
use tracing::{debug, info};

/// Cycles through `count` frame slots.
///
/// Pure value type; [`FrameSynchronizer`] advances it once per presented
/// frame regardless of the acquired image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCounter {
    current: usize,
    count: usize,
}

impl FrameCounter {
    /// Counter over `count` slots starting at slot 0. A zero count is
    /// treated as one slot.
    pub fn new(count: usize) -> Self {
        Self {
            current: 0,
            count: count.max(1),
        }
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Moves to the next slot, wrapping after the last one.
    #[inline]
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.count;
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(MAX_FRAMES_IN_FLIGHT)
    }
}

/// Which slot fences will signal: created signaled, or carried by a
/// submission since their last reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotFences {
    armed: Vec<bool>,
}

impl SlotFences {
    /// Every fence starts signaled.
    pub fn new(count: usize) -> Self {
        Self {
            armed: vec![true; count],
        }
    }

    /// True if waiting on `slot`'s fence returns eventually.
    #[inline]
    pub fn is_armed(&self, slot: usize) -> bool {
        self.armed.get(slot).copied().unwrap_or(false)
    }

    /// The fence was reset and nothing will signal it yet.
    pub fn disarm(&mut self, slot: usize) {
        if let Some(armed) = self.armed.get_mut(slot) {
            *armed = false;
        }
    }

    /// A submission now signals the fence.
    pub fn arm(&mut self, slot: usize) {
        if let Some(armed) = self.armed.get_mut(slot) {
            *armed = true;
        }
    }

    /// Slots whose fences are safe to wait on.
    pub fn armed_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.armed
            .iter()
            .enumerate()
            .filter_map(|(slot, &armed)| armed.then_some(slot))
    }
}

/// Owns the per-slot semaphores and fences and runs the submit/present
/// protocol against a swapchain.
pub struct FrameSynchronizer {
    device: Arc<Device>,
    slots: Vec<FrameSync>,
    fences: SlotFences,
    counter: FrameCounter,
}

impl FrameSynchronizer {
    /// Creates [`MAX_FRAMES_IN_FLIGHT`] slots, each with a signaled fence.
    ///
    /// # Errors
    ///
    /// Returns an error if any semaphore or fence creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Frame synchronizer created with {} frames in flight",
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            device,
            slots,
            fences: SlotFences::new(MAX_FRAMES_IN_FLIGHT),
            counter: FrameCounter::new(MAX_FRAMES_IN_FLIGHT),
        })
    }

    /// Index of the slot the next frame uses.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.counter.current()
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Waits until the current slot is free, resets its fence and acquires
    /// the next swapchain image. Returns the acquired image index.
    ///
    /// A fence left unsignaled by an earlier failed frame is already reset
    /// and is not waited on.
    ///
    /// # Errors
    ///
    /// Returns an error if the fence wait, the reset or the acquisition
    /// fails. An out-of-date swapchain is an error too.
    pub fn begin_frame(&mut self, swapchain: &Swapchain) -> RhiResult<u32> {
        let current = self.counter.current();
        let slot = &self.slots[current];

        if self.fences.is_armed(current) {
            slot.in_flight_fence().wait(u64::MAX)?;
            slot.in_flight_fence().reset()?;
            self.fences.disarm(current);
        } else {
            debug!("Frame slot {} fence has no pending submission, skipping wait", current);
        }

        swapchain.acquire_next_image(slot.image_available())
    }

    /// Submits `command_buffer` to the graphics queue for the current slot.
    ///
    /// # Errors
    ///
    /// Returns an error if queue submission fails.
    pub fn submit(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        let current = self.counter.current();
        let slot = &self.slots[current];

        let wait_semaphores = [slot.image_available()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [slot.render_finished()];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: every handle in submit_info outlives the call; the fence was
        // reset in begin_frame and is unsignaled.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], slot.in_flight_fence().handle())?;
        }
        self.fences.arm(current);
        Ok(())
    }

    /// Presents `image_index` once the current slot's rendering finished,
    /// then advances to the next slot.
    ///
    /// The slot advances only when presentation succeeds; a failed frame
    /// stops the loop anyway.
    ///
    /// # Errors
    ///
    /// Returns an error if presentation fails.
    pub fn present(&mut self, swapchain: &Swapchain, image_index: u32) -> RhiResult<()> {
        let slot = &self.slots[self.counter.current()];

        swapchain.present(
            self.device.present_queue(),
            image_index,
            slot.render_finished(),
        )?;

        self.counter.advance();
        Ok(())
    }

    /// Waits for every slot's last submission to finish. Fences reset by a
    /// frame that failed before submitting are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if any wait fails.
    pub fn wait_for_all_frames(&self) -> RhiResult<()> {
        let fences: Vec<vk::Fence> = self
            .fences
            .armed_slots()
            .map(|slot| self.slots[slot].in_flight_fence().handle())
            .collect();
        if fences.is_empty() {
            debug!("No frame slot has a pending submission");
            return Ok(());
        }

        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, u64::MAX)?;
        }

        debug!("All {} frame slots idle", fences.len());
        Ok(())
    }

    /// Fence bookkeeping per slot.
    #[inline]
    pub fn slot_fences(&self) -> &SlotFences {
        &self.fences
    }

    /// Number of semaphores owned by this synchronizer.
    #[inline]
    pub fn semaphore_count(&self) -> usize {
        self.slots.len() * 2
    }

    /// Number of fences owned by this synchronizer.
    #[inline]
    pub fn fence_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_starts_at_zero() {
        let counter = FrameCounter::default();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.count(), MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn test_counter_returns_after_full_cycle() {
        let mut counter = FrameCounter::new(MAX_FRAMES_IN_FLIGHT);
        let start = counter.current();
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            counter.advance();
        }
        assert_eq!(counter.current(), start);
    }

    #[test]
    fn test_counter_visits_every_slot_once() {
        for count in 1..=4 {
            let mut counter = FrameCounter::new(count);
            let mut visited = vec![counter.current()];
            for _ in 0..count - 1 {
                counter.advance();
                visited.push(counter.current());
            }
            visited.sort_unstable();
            assert_eq!(visited, (0..count).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_counter_zero_count_is_single_slot() {
        let mut counter = FrameCounter::new(0);
        assert_eq!(counter.count(), 1);
        counter.advance();
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_fences_start_armed() {
        let fences = SlotFences::new(MAX_FRAMES_IN_FLIGHT);
        assert!((0..MAX_FRAMES_IN_FLIGHT).all(|slot| fences.is_armed(slot)));
        assert_eq!(
            fences.armed_slots().collect::<Vec<_>>(),
            (0..MAX_FRAMES_IN_FLIGHT).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_reset_without_submit_is_not_waited_on() {
        // Frame on slot 1 resets its fence, then acquire fails
        let mut fences = SlotFences::new(2);
        fences.disarm(1);

        assert!(fences.is_armed(0));
        assert!(!fences.is_armed(1));
        assert_eq!(fences.armed_slots().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_submit_rearms_fence() {
        let mut fences = SlotFences::new(2);
        fences.disarm(0);
        fences.disarm(1);
        assert_eq!(fences.armed_slots().count(), 0);

        fences.arm(0);
        assert_eq!(fences.armed_slots().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_out_of_range_slot_is_never_armed() {
        let mut fences = SlotFences::new(2);
        fences.arm(5);
        fences.disarm(5);
        assert!(!fences.is_armed(5));
        assert_eq!(fences.armed_slots().count(), 2);
    }

    #[test]
    fn test_frame_synchronizer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameSynchronizer>();
    }
}
